mod client;
mod confidence;
mod config;
mod error;
mod favorites;
mod gbif;
mod inaturalist;
mod parse;
mod plantnet;
mod record;
mod report;
mod store;
mod supabase;
#[cfg(test)]
mod test_server;
mod util;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::favorites::{AddOutcome, FavoritesStore};
use crate::gbif::OccurrenceClient;
use crate::inaturalist::{NearbyQuery, ObservationClient};
use crate::parse::{Args, AuthAction, Command, FavoritesAction, FriendsAction};
use crate::plantnet::{Identifier, Organ};
use crate::record::IdentificationCandidate;
use crate::store::{FileStore, KeyValueStore};
use crate::supabase::SupabaseClient;
use crate::util::print_hms;
use clap::Parser;
use futures::future::join_all;
use log::{error, info};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Everything a command needs, built once at startup.
struct App {
    config: Config,
    client: Client,
    store: Arc<dyn KeyValueStore>,
    /// Single owner of the favorites document, so its lock covers every add
    favorites: FavoritesStore,
}

impl App {
    fn new(config: Config, client: Client, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            favorites: FavoritesStore::new(Arc::clone(&store)),
            config,
            client,
            store,
        }
    }

    fn occurrences(&self) -> OccurrenceClient {
        OccurrenceClient::new(self.client.clone(), &self.config.gbif_url)
    }

    fn supabase(&self) -> Result<SupabaseClient> {
        let (url, key) = self.config.require_supabase()?;
        Ok(SupabaseClient::new(
            self.client.clone(),
            url,
            key,
            Arc::clone(&self.store),
        ))
    }
}

/// The `n`-th shown candidate, counting from 1.
pub fn pick_candidate(shown: &[IdentificationCandidate], n: usize) -> Result<&IdentificationCandidate> {
    n.checked_sub(1)
        .and_then(|i| shown.get(i))
        .ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "--save {} is out of range, {} candidate(s) shown",
                n,
                shown.len()
            ))
        })
}

fn save_favorite(app: &App, candidate: &IdentificationCandidate) -> Result<()> {
    match app.favorites.add(candidate)? {
        AddOutcome::Added => println!("¡Guardado! Añadido a favoritos."),
        AddOutcome::AlreadyPresent => println!("Ya está en favoritos"),
    }
    Ok(())
}

async fn identify(
    app: &App,
    image: &Path,
    organ: Organ,
    save: Option<usize>,
    with_gallery: bool,
) -> Result<()> {
    let start = Instant::now();
    let bytes = plantnet::read_image(image)?;
    let identifier = Identifier::new(
        app.client.clone(),
        &app.config.plantnet_url,
        app.config.require_plantnet_key()?,
    );

    let spinner = util::spinner("Analizando imagen...");
    let result = identifier.identify(bytes, organ).await;
    spinner.finish_and_clear();
    let candidates = result.inspect_err(|e| error!("Identification failed: {}", e))?;

    println!("Resultados de identificación 🌿");
    if candidates.is_empty() {
        println!("No se encontraron coincidencias.");
        return Ok(());
    }

    let shown = &candidates[..candidates.len().min(report::MAX_CARDS)];
    let galleries = if with_gallery {
        let client = app.occurrences();
        let occurrences = &client;
        let progress = Arc::new(util::progress_bar(shown.len() as u64, "Cargando fotos"));
        let tasks = shown.iter().map(|candidate| {
            let progress = Arc::clone(&progress);
            async move {
                let gallery = occurrences.gallery(candidate.scientific_name()).await;
                progress.inc(1);
                gallery
            }
        });
        let galleries = join_all(tasks).await;
        progress.finish_and_clear();
        galleries
    } else {
        vec![Vec::new(); shown.len()]
    };

    for (index, (candidate, gallery)) in shown.iter().zip(&galleries).enumerate() {
        println!("{}\n", report::candidate_card(index, candidate, gallery));
    }

    if let Some(n) = save {
        save_favorite(app, pick_candidate(shown, n)?)?;
    }

    print_hms(&start);
    Ok(())
}

fn favorites(app: &App, action: FavoritesAction) -> Result<()> {
    let store = &app.favorites;
    match action {
        FavoritesAction::List => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No tienes favoritos aún.");
            }
            for entry in &entries {
                println!("{}\n", report::favorite_card(entry));
            }
        }
        FavoritesAction::Remove { scientific_name } => {
            store.remove(&scientific_name)?;
            println!("Eliminado: el favorito ha sido eliminado.");
        }
        FavoritesAction::Export { output } => {
            let count = store.export_csv(&output)?;
            println!("{} favoritos exportados a {}", count, output);
        }
    }
    Ok(())
}

async fn distribution(app: &App, scientific_name: &str, output: Option<&str>) -> Result<()> {
    let points = app.occurrences().occurrences(scientific_name).await?;
    println!("{}", report::distribution_summary(scientific_name, &points));
    if let Some(output) = output {
        gbif::save_points_csv(&points, output)?;
    }
    Ok(())
}

async fn nearby(app: &App, query: NearbyQuery) -> Result<()> {
    let observations = ObservationClient::new(
        app.client.clone(),
        &app.config.inaturalist_url,
        &app.config.locale,
    );
    let species = observations.nearby(&query).await?;
    if species.is_empty() {
        println!("No se encontraron especies cercanas.");
    }
    for s in &species {
        println!("{}", report::nearby_line(s));
    }
    Ok(())
}

async fn auth(app: &App, action: AuthAction) -> Result<()> {
    let supabase = app.supabase()?;
    match action {
        AuthAction::SignUp {
            email,
            password,
            name,
        } => {
            let user = supabase.sign_up(&email, &password, &name).await?;
            println!("Usuario registrado: {}", user.id);
        }
        AuthAction::SignIn {
            email,
            password,
            name,
        } => {
            let session = supabase.sign_in(&email, &password, &name).await?;
            println!("¡Bienvenido! Iniciado sesión correctamente.");
            println!(
                "Sesión iniciada: {}",
                session.user.email.as_deref().unwrap_or(&session.user.id)
            );
        }
        AuthAction::SignOut => {
            supabase.sign_out().await?;
            println!("Sesión cerrada.");
        }
        AuthAction::Whoami => {
            let user = supabase.current_user().await?;
            println!("{} {}", user.id, user.email.unwrap_or_default());
        }
    }
    Ok(())
}

async fn friends(app: &App, action: FriendsAction) -> Result<()> {
    let supabase = app.supabase()?;
    match action {
        FriendsAction::Search { query } => {
            let users = supabase.search_users(&query).await?;
            if users.is_empty() {
                println!("No se encontraron usuarios.");
            }
            for user in &users {
                println!("{}  {}", user.id, user);
            }
        }
        FriendsAction::Request { user_id } => {
            supabase.send_friend_request(&user_id).await?;
            println!("Solicitud enviada: la solicitud de amistad ha sido enviada.");
        }
        FriendsAction::Accept { request_id } => {
            supabase.accept_friend_request(&request_id).await?;
            println!("¡Ahora sois amigos!");
        }
        FriendsAction::List => {
            let friends = supabase.friends().await?;
            if friends.is_empty() {
                println!("Todavía no tienes amigos.");
            }
            for friend in &friends {
                println!("{}", friend);
            }
        }
        FriendsAction::Pending => {
            let pending = supabase.pending_requests().await?;
            if pending.is_empty() {
                println!("No hay solicitudes pendientes.");
            }
            for p in &pending {
                let who = p
                    .requester
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| p.request.requester_user_id.clone());
                println!("{}  {}  [{}]", p.request.request_id, who, p.request.status);
            }
        }
    }
    Ok(())
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Identify {
            image,
            organ,
            save,
            no_gallery,
        } => identify(app, &image, organ, save, !no_gallery).await,
        Command::Favorites { action } => favorites(app, action),
        Command::Distribution {
            scientific_name,
            output,
        } => distribution(app, &scientific_name, output.as_deref()).await,
        Command::Nearby { lat, lng, radius } => {
            let query = NearbyQuery {
                latitude: lat,
                longitude: lng,
                radius_km: radius,
            };
            nearby(app, query).await
        }
        Command::Auth { action } => auth(app, action).await,
        Command::Friends { action } => friends(app, action).await,
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    // Initialize logger
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load(args.config.as_deref())?;
    info!("Data directory: {}", config.data_dir.display());
    let client = client::build_client(&config)?;
    let store = Arc::new(FileStore::new(&config.data_dir));
    let app = App::new(config, client, store);

    if let Err(e) = run(&app, args.command).await {
        error!("{}", e);
        eprintln!("{}", e.notice());
        std::process::exit(1);
    }

    Ok(())
}
