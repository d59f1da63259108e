//! Tamarind CLI - storefront client for the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and inspect the session
//! tam login -e jane@example.com -p secret
//! tam whoami
//!
//! # Work with the cart
//! tam cart add prod_123 --quantity 2
//! tam cart ls
//! tam cart update prod_123 5
//!
//! # Work with the wishlist
//! tam wishlist toggle prod_456
//! tam wishlist ls
//! ```
//!
//! # Commands
//!
//! - `login`, `login-google`, `register`, `logout` - session lifecycle
//! - `whoami`, `profile` - inspect and edit the signed-in user
//! - `cart` - optimistic cart operations
//! - `wishlist` - optimistic wishlist operations
//!
//! # Environment Variables
//!
//! - `TAMARIND_API_BASE_URL` - base URL of the storefront API (required)
//! - `TAMARIND_API_TIMEOUT_SECS` - request timeout, 1 to 30 (default 8)
//! - `TAMARIND_TOKEN_PATH` - token store location (default under the
//!   platform data directory)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tam")]
#[command(author, version, about = "Tamarind storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Sign in by exchanging a Google ID token
    LoginGoogle {
        /// ID token from the Google sign-in flow
        id_token: String,
    },
    /// Create an account and sign in
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Show the current session
    Whoami,
    /// Update the signed-in user's profile
    Profile {
        /// New display name
        #[arg(short, long)]
        name: Option<String>,

        /// New avatar URL
        #[arg(short, long)]
        avatar_url: Option<String>,
    },
    /// Sign out
    Logout,
    /// Shopping cart operations
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Wishlist operations
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add a product to the cart
    Add {
        /// Product ID
        product: String,

        /// How many to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Variant ID, for products that have them
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// List the cart with its item count and subtotal
    Ls,
    /// Set the quantity of a cart line (0 removes it)
    Update {
        /// Product ID
        product: String,

        /// New quantity
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        product: String,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Add or remove a product, whichever applies
    Toggle {
        /// Product ID
        product: String,
    },
    /// List the wishlist
    Ls,
    /// Remove a product from the wishlist
    Remove {
        /// Product ID
        product: String,
    },
    /// Empty the wishlist
    Clear,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Login { email, password } => {
            commands::session::login(&email, &password).await?;
        }
        Commands::LoginGoogle { id_token } => {
            commands::session::login_google(&id_token).await?;
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            commands::session::register(&name, &email, &password).await?;
        }
        Commands::Whoami => commands::session::whoami().await?,
        Commands::Profile { name, avatar_url } => {
            commands::session::profile(name, avatar_url).await?;
        }
        Commands::Logout => commands::session::logout().await?,
        Commands::Cart { action } => match action {
            CartAction::Add {
                product,
                quantity,
                variant,
            } => commands::cart::add(&product, quantity, variant).await?,
            CartAction::Ls => commands::cart::ls().await?,
            CartAction::Update { product, quantity } => {
                commands::cart::update(&product, quantity).await?;
            }
            CartAction::Remove { product } => commands::cart::remove(&product).await?,
            CartAction::Clear => commands::cart::clear().await?,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::Toggle { product } => commands::wishlist::toggle(&product).await?,
            WishlistAction::Ls => commands::wishlist::ls().await?,
            WishlistAction::Remove { product } => commands::wishlist::remove(&product).await?,
            WishlistAction::Clear => commands::wishlist::clear().await?,
        },
    }
    Ok(())
}
