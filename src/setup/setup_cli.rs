use amblog::config::Config;
use amblog::helper::image_helpers::MediaStore;
use amblog::models::db_operations::users_db_operations;
use amblog::setup::db_setup;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for amblog setup and user management.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Staff users may author posts and manage tags.
        #[arg(long)]
        staff: bool,
    },
    List,
    Delete {
        #[arg(long)]
        username: String,
    },
    SetStaff {
        #[arg(long)]
        username: String,
        #[arg(long, action = clap::ArgAction::Set)]
        value: bool,
    },
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum MediaAction {
    /// Removes staged post images older than the given number of hours.
    PruneTmp {
        #[arg(long, default_value_t = 24)]
        older_than_hours: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_database(&config),
        Commands::User { action } => {
            let Some(conn) = open_database(&config) else { return };
            match action {
                UserAction::Create { username, password, staff } => create_user(&conn, username, password, *staff),
                UserAction::List => list_users(&conn),
                UserAction::Delete { username } => delete_user(&conn, username),
                UserAction::SetStaff { username, value } => set_staff(&conn, username, *value),
                UserAction::ChangePassword { username, new_password } => change_password(&conn, username, new_password),
            }
        }
        Commands::Media { action: MediaAction::PruneTmp { older_than_hours } } => {
            prune_staged_images(&config, *older_than_hours)
        }
    }
}

fn setup_database(config: &Config) {
    let db_path = config.blog_db_path();
    if db_path.exists() {
        println!("ℹ️ Blog database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create blog database file.");
    match db_setup::setup_blog_db(&mut conn) {
        Ok(_) => println!("✅ Blog database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up blog database: {}", e),
    }
}

fn open_database(config: &Config) -> Option<Connection> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Blog database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => {
            if let Err(e) = conn.execute_batch("PRAGMA foreign_keys = ON;") {
                eprintln!("❌ Error enabling foreign keys: {}", e);
                return None;
            }
            Some(conn)
        }
        Err(e) => {
            eprintln!("❌ Error opening blog database: {}", e);
            None
        }
    }
}

fn create_user(conn: &Connection, username: &str, password: &str, staff: bool) {
    if username.trim().is_empty() || password.is_empty() {
        eprintln!("❌ Error: Username and password must not be empty.");
        return;
    }
    match users_db_operations::create_user(conn, username, password, staff) {
        Ok(id) => println!("✅ User '{}' created with id {}{}.", username, id, if staff { " (staff)" } else { "" }),
        Err(e) => eprintln!("❌ Error creating user: {}. It might be because the username already exists.", e),
    }
}

fn list_users(conn: &Connection) {
    match users_db_operations::read_all_users(conn) {
        Ok(users) => {
            println!("Listing users:");
            for user in users {
                println!(
                    "- {} [{}{}] last login: {}",
                    user.username,
                    if user.is_staff { "staff" } else { "reader" },
                    if user.is_active { "" } else { ", inactive" },
                    user.last_login_time.as_deref().unwrap_or("never"),
                );
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn delete_user(conn: &Connection, username: &str) {
    match users_db_operations::delete_user(conn, username) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) => println!("✅ User '{}' deleted. Their posts and comments are kept without an author.", username),
        Err(e) => eprintln!("❌ Error deleting user: {}", e),
    }
}

fn set_staff(conn: &Connection, username: &str, value: bool) {
    match users_db_operations::set_staff(conn, username, value) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) => println!("✅ Staff flag for '{}' set to {}. It applies from their next login.", username, value),
        Err(e) => eprintln!("❌ Error updating user: {}", e),
    }
}

fn change_password(conn: &Connection, username: &str, new_password: &str) {
    match users_db_operations::change_password(conn, username, new_password) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) => println!("✅ Password for '{}' changed successfully.", username),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}

fn prune_staged_images(config: &Config, older_than_hours: u64) {
    let store = MediaStore::new(&config.media_path);
    match store.prune_staged(Duration::from_secs(older_than_hours * 3600)) {
        Ok(removed) => println!("✅ Removed {} staged image(s).", removed),
        Err(e) => eprintln!("❌ Error pruning staged images: {}", e),
    }
}
