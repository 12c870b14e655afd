use audiopoll_core::{format_clock, FeedbackRecord};
use audiopoll_engine::FeedbackContext;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Ordered, flat name/value pairs as the relay receives them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldSet {
    fields: Vec<(&'static str, String)>,
}

impl FieldSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.fields.push((name, value.into()));
    }
}

#[derive(Debug, Clone)]
pub struct FieldOptions {
    pub confirmation_url: String,
    pub captcha: bool,
}

pub fn build_fields(
    ctx: &FeedbackContext,
    feedback: &FeedbackRecord,
    opts: &FieldOptions,
    submitted_at: DateTime<Utc>,
) -> FieldSet {
    let user = &ctx.user;
    let mut set = FieldSet {
        fields: Vec::with_capacity(15),
    };

    set.push("_next", opts.confirmation_url.as_str());
    set.push(
        "_subject",
        format!(
            "Nouveau feedback de {} {} - {}",
            user.first_name, user.last_name, ctx.course.title
        ),
    );
    set.push("_captcha", opts.captcha.to_string());
    set.push("prénom", user.first_name.as_str());
    set.push("nom", user.last_name.as_str());
    set.push("email", user.email.as_str());
    set.push(
        "timestamp",
        submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    set.push("cours_selectionne", ctx.course.id);
    set.push("titre_cours", ctx.course.title);
    set.push("note_satisfaction", feedback.rating.to_string());
    set.push("commentaires", feedback.comments.as_str());
    set.push(
        "disposition_a_payer",
        feedback.willing_to_pay.map(|w| w.as_str()).unwrap_or_default(),
    );
    set.push(
        "montant_acceptable",
        feedback.amount.clone().unwrap_or_default(),
    );
    set.push("temps_ecoute", format_clock(ctx.progress.cumulative_seconds));
    set.push("duree_totale", format_clock(ctx.total_duration_seconds));
    set
}

#[cfg(test)]
mod tests {
    use super::{build_fields, FieldOptions};
    use audiopoll_core::{Catalog, FeedbackRecord, ListeningProgress, UserInfo, WillingToPay};
    use audiopoll_engine::FeedbackContext;
    use chrono::{TimeZone, Utc};

    fn context() -> FeedbackContext {
        FeedbackContext {
            user: UserInfo {
                first_name: "Jean".to_string(),
                last_name: "Dupont".to_string(),
                email: "jean@x.com".to_string(),
            },
            course: Catalog::builtin().get("TC4").unwrap(),
            progress: ListeningProgress {
                cumulative_seconds: 245.6,
                required_seconds: 233,
                threshold_reached: true,
            },
            total_duration_seconds: 932.0,
        }
    }

    fn opts() -> FieldOptions {
        FieldOptions {
            confirmation_url: "https://audiopoll.example/merci".to_string(),
            captcha: false,
        }
    }

    #[test]
    fn carries_identity_course_and_rating() {
        let feedback = FeedbackRecord {
            rating: 4,
            comments: "Très bien expliqué".to_string(),
            willing_to_pay: Some(WillingToPay::Oui),
            amount: Some("4".to_string()),
        };
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let set = build_fields(&context(), &feedback, &opts(), at);

        assert_eq!(set.get("prénom"), Some("Jean"));
        assert_eq!(set.get("nom"), Some("Dupont"));
        assert_eq!(set.get("email"), Some("jean@x.com"));
        assert_eq!(set.get("cours_selectionne"), Some("TC4"));
        assert_eq!(set.get("titre_cours"), Some("Cours: Poteaux en Béton Armé"));
        assert_eq!(set.get("note_satisfaction"), Some("4"));
        assert_eq!(set.get("disposition_a_payer"), Some("oui"));
        assert_eq!(set.get("montant_acceptable"), Some("4"));
        assert_eq!(set.get("temps_ecoute"), Some("04:05"));
        assert_eq!(set.get("duree_totale"), Some("15:32"));
        assert_eq!(set.get("timestamp"), Some("2026-10-18T09:30:00.000Z"));
        assert_eq!(set.get("_next"), Some("https://audiopoll.example/merci"));
        assert_eq!(
            set.get("_subject"),
            Some("Nouveau feedback de Jean Dupont - Cours: Poteaux en Béton Armé")
        );
        assert_eq!(set.len(), 15);
    }

    #[test]
    fn optional_answers_become_empty_strings() {
        let feedback = FeedbackRecord {
            rating: 2,
            comments: "Trop long".to_string(),
            willing_to_pay: None,
            amount: None,
        };
        let set = build_fields(&context(), &feedback, &opts(), Utc::now());
        assert_eq!(set.get("disposition_a_payer"), Some(""));
        assert_eq!(set.get("montant_acceptable"), Some(""));
        assert_eq!(set.get("_captcha"), Some("false"));
    }

    #[test]
    fn keeps_relay_field_order() {
        let feedback = FeedbackRecord {
            rating: 5,
            comments: "ok".to_string(),
            willing_to_pay: None,
            amount: None,
        };
        let set = build_fields(&context(), &feedback, &opts(), Utc::now());
        let names: Vec<_> = set.iter().map(|(k, _)| k).take(6).collect();
        assert_eq!(
            names,
            vec!["_next", "_subject", "_captcha", "prénom", "nom", "email"]
        );
    }
}
