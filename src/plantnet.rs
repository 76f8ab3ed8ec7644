use crate::error::{AppError, Result};
use crate::record::{IdentificationCandidate, IdentificationResponse};
use log::{debug, info};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

/// Plant part shown in the submitted image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Organ {
    #[default]
    Leaf,
    Flower,
    Fruit,
    Bark,
    Habit,
}

impl Organ {
    pub const ALL: [Organ; 5] = [
        Organ::Leaf,
        Organ::Flower,
        Organ::Fruit,
        Organ::Bark,
        Organ::Habit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Organ::Leaf => "leaf",
            Organ::Flower => "flower",
            Organ::Fruit => "fruit",
            Organ::Bark => "bark",
            Organ::Habit => "habit",
        }
    }
}

impl fmt::Display for Organ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Organ {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Organ::ALL
            .into_iter()
            .find(|o| o.as_str() == wanted)
            .ok_or_else(|| {
                AppError::InvalidArgument(format!(
                    "unknown organ {:?}, expected one of leaf, flower, fruit, bark, habit",
                    s
                ))
            })
    }
}

/// Client for the species identification endpoint.
pub struct Identifier {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl Identifier {
    pub fn new(client: Client, endpoint: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Submit one JPEG image and return candidates in upstream order.
    /// Any transport failure or non-2xx status fails the whole call.
    pub async fn identify(
        &self,
        image: Vec<u8>,
        organ: Organ,
    ) -> Result<Vec<IdentificationCandidate>> {
        let size = image.len();
        debug!("Submitting {} byte image as {}", size, organ);
        let body = self
            .submit(image, organ)
            .await
            .map_err(AppError::Identification)?;
        info!("Identification returned {} candidates", body.results.len());
        Ok(body.results)
    }

    async fn submit(&self, image: Vec<u8>, organ: Organ) -> reqwest::Result<IdentificationResponse> {
        let part = Part::bytes(image)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("images", part)
            .text("organs", organ.as_str());

        self.client
            .post(&self.endpoint)
            .query(&[("api-key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// Read an image from disk, reporting refused access separately from other
/// I/O failures.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => AppError::PermissionDenied(path.display().to_string()),
        _ => AppError::Io(e),
    })
}
