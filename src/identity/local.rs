use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::{IdentityService, SignupRequest, SignupResponse};
use crate::config::{GENERATED_PASSWORD_LENGTH, STUDENT_EMAIL_MAX_ATTEMPTS};
use crate::models::{UserAccount, UserRole};
use crate::store::{DocumentStore, Query, to_document_data};
use crate::utils::random::{generate_random_string, random_digits};

/// Signup requests the service refuses, as opposed to backend failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignupRejection {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Parent email '{0}' is already registered")]
    EmailTaken(String),
}

/// Signup backed by the `users` collection of the document store.
pub struct LocalIdentityService {
    store: Arc<dyn DocumentStore>,
    user_collection: String,
    email_domain: String,
    hash_cost: u32,
}

impl LocalIdentityService {
    pub fn new(store: Arc<dyn DocumentStore>, user_collection: &str, email_domain: &str) -> Self {
        Self {
            store,
            user_collection: user_collection.to_string(),
            email_domain: email_domain.trim_start_matches('@').to_string(),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    async fn email_taken(&self, email: &str) -> Result<bool> {
        let existing = self
            .store
            .list(
                &self.user_collection,
                &[Query::equal("email", email.to_lowercase()), Query::Limit(1)],
            )
            .await
            .context("Failed to look up user by email")?;
        Ok(!existing.is_empty())
    }

    async fn unique_student_email(&self, student_name: &str) -> Result<String> {
        let slug = slugify(student_name);
        for _ in 0..STUDENT_EMAIL_MAX_ATTEMPTS {
            let candidate = format!("{}.{}@{}", slug, random_digits(4), self.email_domain);
            if !self.email_taken(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(email = %candidate, "Generated student email already taken, retrying");
        }
        Err(anyhow!(
            "Could not generate a unique email for '{}' after {} attempts",
            student_name,
            STUDENT_EMAIL_MAX_ATTEMPTS
        ))
    }

    async fn create_account(&self, name: &str, email: &str, role: UserRole) -> Result<String> {
        let password = generate_random_string(GENERATED_PASSWORD_LENGTH);
        let cost = self.hash_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")?;

        let account = UserAccount {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_lowercase(),
            role,
            password_hash,
        };
        self.store
            .create(&self.user_collection, &account.id, to_document_data(&account)?)
            .await
            .with_context(|| format!("Failed to create {:?} account for {}", role, email))?;

        tracing::info!(user_id = %account.id, role = ?role, "Created user account");
        Ok(account.id)
    }
}

#[async_trait]
impl IdentityService for LocalIdentityService {
    async fn signup(&self, request: SignupRequest) -> Result<SignupResponse> {
        let student_name = request.student_name.trim();
        if student_name.is_empty() {
            return Err(SignupRejection::MissingField("Student name").into());
        }

        let parent = if request.is_existing_parent {
            None
        } else {
            let name = request
                .parent_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or(SignupRejection::MissingField("Parent name"))?;
            let email = request
                .parent_email
                .as_deref()
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .ok_or(SignupRejection::MissingField("Parent email"))?;
            if self.email_taken(email).await? {
                return Err(SignupRejection::EmailTaken(email.to_string()).into());
            }
            Some((name, email))
        };

        let student_email = self.unique_student_email(student_name).await?;
        let parent_user_id = match parent {
            Some((name, email)) => Some(self.create_account(name, email, UserRole::Parent).await?),
            None => None,
        };
        let student_user_id = self
            .create_account(student_name, &student_email, UserRole::Student)
            .await?;

        Ok(SignupResponse {
            student_user_id,
            parent_user_id,
            student_email,
        })
    }
}

/// Lowercase ASCII words of `name` joined by dots, `"student"` when nothing
/// usable remains.
fn slugify(name: &str) -> String {
    let words: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    if words.is_empty() {
        "student".to_string()
    } else {
        words.join(".")
    }
}
