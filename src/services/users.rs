use csv::{ReaderBuilder, WriterBuilder};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::models::user::{CreateUserRequest, Role, UserAccount};
use crate::services::database::StoreError;

type HmacSha256 = Hmac<Sha256>;

// CSV-backed user directory with HMAC-SHA256 credential digests
pub struct UserDirectory {
    csv_path: String,
    secret: String,
    file_mutex: Mutex<()>,
}

impl UserDirectory {
    pub fn new(csv_path: &str, secret: &str) -> Self {
        let directory = Self {
            csv_path: csv_path.to_string(),
            secret: secret.to_string(),
            file_mutex: Mutex::new(()),
        };

        // Seed the default development accounts on first run
        if !Path::new(csv_path).exists() {
            info!("Creating new users file at {}", csv_path);

            let file = File::create(csv_path).unwrap_or_else(|e| {
                error!("Failed to create users file: {}", e);
                panic!("Failed to create users file: {}", e)
            });

            // serialize() emits the header row itself on first use
            let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

            let defaults = [
                ("admin", "admin@roomsync.com", Role::Admin, "admin123"),
                ("faculty", "faculty@roomsync.com", Role::Faculty, "faculty123"),
                ("student", "student@roomsync.com", Role::StudentRep, "student123"),
            ];

            for (username, email, role, password) in defaults {
                let account = UserAccount {
                    username: username.to_string(),
                    email: email.to_string(),
                    role,
                    password_digest: directory.digest(username, password),
                };
                if let Err(e) = writer.serialize(&account) {
                    error!("Failed to seed user {}: {}", username, e);
                    panic!("Failed to seed user {}: {}", username, e);
                }
            }

            if let Err(e) = writer.flush() {
                error!("Failed to flush users file: {}", e);
                panic!("Failed to flush users file: {}", e);
            }

            warn!("Seeded default development accounts (admin/faculty/student) - change their passwords before exposing this service");
        }

        directory
    }

    fn digest(&self, username: &str, password: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{}:{}", username, password).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn read_all(&self) -> Result<Vec<UserAccount>, StoreError> {
        let file = File::open(&self.csv_path)
            .map_err(|e| StoreError::Storage(format!("Failed to open users file: {}", e)))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut accounts = Vec::new();

        for result in reader.deserialize() {
            let account: UserAccount = result
                .map_err(|e| StoreError::Storage(format!("Failed to read user record: {}", e)))?;
            accounts.push(account);
        }

        Ok(accounts)
    }

    fn write_all(&self, accounts: &[UserAccount]) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.csv_path)
            .map_err(|e| {
                StoreError::Storage(format!("Failed to open users file for writing: {}", e))
            })?;

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

        for account in accounts {
            writer
                .serialize(account)
                .map_err(|e| StoreError::Storage(format!("Failed to write user record: {}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| StoreError::Storage(format!("Failed to flush users file: {}", e)))?;

        Ok(())
    }

    // Check credentials; None means unknown user or wrong password,
    // indistinguishable on purpose
    pub fn verify(&self, username: &str, password: &str) -> Result<Option<UserAccount>, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let expected = self.digest(username, password);
        Ok(self
            .read_all()?
            .into_iter()
            .find(|a| a.username == username && a.password_digest == expected))
    }

    pub fn find(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        Ok(self.read_all()?.into_iter().find(|a| a.username == username))
    }

    pub fn list_users(&self) -> Result<Vec<UserAccount>, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        self.read_all()
    }

    pub fn create_user(&self, request: &CreateUserRequest) -> Result<UserAccount, StoreError> {
        let username = request.username.trim();
        if username.is_empty()
            || !username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(StoreError::Invalid(format!(
                "Invalid username: {}",
                request.username
            )));
        }
        if request.password.len() < 6 {
            return Err(StoreError::Invalid(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let mut accounts = self.read_all()?;
        if accounts.iter().any(|a| a.username == username) {
            return Err(StoreError::Conflict(format!(
                "User {} already exists",
                username
            )));
        }

        let account = UserAccount {
            username: username.to_string(),
            email: request.email.clone(),
            role: request.role,
            password_digest: self.digest(username, &request.password),
        };

        accounts.push(account.clone());
        self.write_all(&accounts)?;

        info!("Created user {} with role {}", username, account.role.as_str());
        Ok(account)
    }

    pub fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let mut accounts = self.read_all()?;
        let before = accounts.len();
        accounts.retain(|a| a.username != username);

        if accounts.len() == before {
            return Err(StoreError::NotFound(format!("User {} not found", username)));
        }

        self.write_all(&accounts)?;
        info!("Deleted user {}", username);
        Ok(())
    }
}

// Create a singleton user directory from the environment
pub fn create_user_directory(secret: &str) -> Arc<UserDirectory> {
    let csv_path =
        std::env::var("ROOMSYNC_USERS_PATH").unwrap_or_else(|_| "/app/data/users.csv".to_string());

    if let Some(dir) = std::path::Path::new(&csv_path).parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!("Failed to create data directory: {}", e);
            panic!("Failed to create data directory: {}", e);
        }
    }

    Arc::new(UserDirectory::new(&csv_path, secret))
}
