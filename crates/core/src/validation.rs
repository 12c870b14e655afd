use crate::model::{FeedbackRecord, UserInfo, WillingToPay};
use std::fmt;
use thiserror::Error;

pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Field-level messages collected from one form submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn check(&mut self, ok: bool, field: &'static str, message: &'static str) {
        if !ok {
            self.errors.push(FieldError { field, message });
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

/// Raw identity form input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl IdentityDraft {
    pub fn validate(&self) -> Result<UserInfo, ValidationErrors> {
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        let email = self.email.trim();

        let mut c = Collector::default();
        c.check(!first_name.is_empty(), "prenom", "Le prénom est requis.");
        c.check(!last_name.is_empty(), "nom", "Le nom est requis.");
        c.check(
            is_plausible_email(email),
            "email",
            "L'adresse email est invalide.",
        );
        c.finish(|| UserInfo {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
        })
    }
}

/// Raw feedback form input. A `rating` of 0 means no star was picked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackDraft {
    pub rating: u8,
    pub comments: String,
    pub willing_to_pay: Option<WillingToPay>,
    pub amount: Option<String>,
}

impl FeedbackDraft {
    pub fn validate(&self) -> Result<FeedbackRecord, ValidationErrors> {
        let comments = self.comments.trim();

        let mut c = Collector::default();
        c.check(self.rating >= 1, "rating", "Veuillez attribuer une note.");
        c.check(
            self.rating <= MAX_RATING,
            "rating",
            "La note doit être comprise entre 1 et 5.",
        );
        c.check(
            !comments.is_empty(),
            "comments",
            "Veuillez laisser un commentaire.",
        );

        let amount = match self.willing_to_pay {
            Some(w) if w.asks_amount() => self
                .amount
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            _ => None,
        };

        c.finish(|| FeedbackRecord {
            rating: self.rating,
            comments: comments.to_string(),
            willing_to_pay: self.willing_to_pay,
            amount,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !host.starts_with('.') && tld.len() >= 2
}
