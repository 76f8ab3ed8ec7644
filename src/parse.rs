use crate::plantnet::Organ;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plantbuddy")]
#[command(about = "Identify plants from photos, keep favorites and explore where species grow")]
#[command(version)]
pub(crate) struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Identify the plant in a JPEG image
    Identify {
        /// Image file to submit
        image: PathBuf,

        /// Plant part shown: leaf, flower, fruit, bark or habit
        #[arg(short, long, default_value = "leaf")]
        organ: Organ,

        /// Save the N-th shown candidate (1-based) to favorites
        #[arg(short, long)]
        save: Option<usize>,

        /// Skip fetching photo galleries for each candidate
        #[arg(long)]
        no_gallery: bool,
    },

    /// Manage saved favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },

    /// Show where a species has been recorded
    Distribution {
        scientific_name: String,

        /// Also write the points to this CSV file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List plant species observed near a location
    Nearby {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Search radius in kilometres
        #[arg(short, long, default_value = "10")]
        radius: f64,
    },

    /// Account management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Find users and manage friend requests
    Friends {
        #[command(subcommand)]
        action: FriendsAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum FavoritesAction {
    List,

    Remove { scientific_name: String },

    /// Write favorites to a CSV file
    Export {
        #[arg(short, long, default_value = "favorites.csv")]
        output: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum AuthAction {
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },

    /// Sign in; creates or completes your profile with `--name`
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },

    SignOut,

    /// Show the signed-in user
    Whoami,
}

#[derive(Subcommand)]
pub(crate) enum FriendsAction {
    /// Search users by name or email
    Search { query: String },

    /// Send a friend request to a user id
    Request { user_id: String },

    /// Accept a received friend request
    Accept { request_id: String },

    /// List accepted friends
    List,

    /// List received requests awaiting an answer
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_args() {
        let args = Args::try_parse_from([
            "plantbuddy", "identify", "rose.jpg", "--organ", "flower", "--save", "1",
        ])
        .unwrap();
        match args.command {
            Command::Identify { image, organ, save, no_gallery } => {
                assert_eq!(image, PathBuf::from("rose.jpg"));
                assert_eq!(organ, Organ::Flower);
                assert_eq!(save, Some(1));
                assert!(!no_gallery);
            }
            _ => panic!("expected identify"),
        }
    }

    #[test]
    fn test_default_organ_and_bad_organ() {
        let args = Args::try_parse_from(["plantbuddy", "identify", "leaf.jpg"]).unwrap();
        assert!(matches!(args.command, Command::Identify { organ: Organ::Leaf, .. }));

        assert!(Args::try_parse_from(["plantbuddy", "identify", "x.jpg", "--organ", "root"]).is_err());
    }

    #[test]
    fn test_nearby_negative_coordinates() {
        let args = Args::try_parse_from([
            "plantbuddy", "--verbose", "nearby", "--lat", "40.4", "--lng", "-3.7",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Nearby { lat, lng, radius } => {
                assert_eq!((lat, lng, radius), (40.4, -3.7, 10.0));
            }
            _ => panic!("expected nearby"),
        }
    }

    #[test]
    fn test_nested_subcommands() {
        let args = Args::try_parse_from(["plantbuddy", "favorites", "remove", "Rosa canina"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Favorites { action: FavoritesAction::Remove { ref scientific_name } }
                if scientific_name == "Rosa canina"
        ));

        let args = Args::try_parse_from([
            "plantbuddy", "auth", "sign-in", "--email", "a@b.c", "--password", "pw", "--name", "Ana",
        ])
        .unwrap();
        match args.command {
            Command::Auth { action: AuthAction::SignIn { name, .. } } => assert_eq!(name, "Ana"),
            _ => panic!("expected auth sign-in"),
        }
        assert!(
            Args::try_parse_from(["plantbuddy", "auth", "sign-in", "--email", "a@b.c", "--password", "pw"])
                .is_err()
        );
    }
}
