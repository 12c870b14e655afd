use audiopoll_core::{format_clock, format_duration, Catalog, Course, PlaybackState};
use audiopoll_engine::{Session, Stage};
use std::fmt::Write;

const BAR_WIDTH: usize = 30;

pub const CONFIRMATION: &str = "Merci ! Votre avis a été enregistré avec succès. \
     Nous vous recontacterons bientôt avec nos offres de cours premium.";

fn state_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Playing => "▶ lecture",
        PlaybackState::Paused => "⏸ pause",
        PlaybackState::Ended => "■ terminé",
    }
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// One line: state, clock and listening progress.
pub fn compact(session: &Session) -> String {
    let Some(course) = session.stage().course() else {
        return format!("aucun cours ({})", session.stage().name());
    };
    let pos = session.position();
    let progress = session.progress();
    let duration = pos
        .duration
        .unwrap_or_else(|| f64::from(course.duration_seconds));
    format!(
        "{} {} {} / {} · écoute {} / {}{}",
        course.id,
        state_label(pos.state()),
        format_clock(pos.current_time),
        format_clock(duration),
        format_clock(progress.cumulative_seconds),
        format_clock(f64::from(progress.required_seconds)),
        if progress.threshold_reached { " ✓" } else { "" },
    )
}

/// Multi-line player with a seek bar, rate and the unlock status.
pub fn full(session: &Session) -> String {
    let stage = session.stage();
    let Some(course) = stage.course() else {
        return compact(session);
    };
    let pos = session.position();
    let progress = session.progress();
    let duration = pos
        .duration
        .unwrap_or_else(|| f64::from(course.duration_seconds));

    let mut out = String::new();
    let _ = writeln!(out, "{}", course.title);
    if let Some(subtitle) = course.subtitle {
        let _ = writeln!(out, "{subtitle}");
    }
    let _ = writeln!(
        out,
        "{} {} {} {}  x{}",
        format_clock(pos.current_time),
        progress_bar(pos.progress_percent()),
        format_clock(duration),
        state_label(pos.state()),
        pos.playback_rate,
    );
    if progress.threshold_reached {
        let _ = write!(out, "Formulaire d'avis disponible (feedback ...)");
    } else {
        let _ = write!(
            out,
            "Encore {} d'écoute avant l'ouverture du formulaire d'avis",
            format_clock(progress.remaining_seconds().ceil()),
        );
    }
    out
}

pub fn catalog(catalog: &Catalog) -> String {
    let mut out = String::new();
    for course in catalog.courses() {
        let _ = writeln!(out, "{}", course_line(course));
    }
    out.trim_end().to_string()
}

fn course_line(course: &Course) -> String {
    format!(
        "  {:<6} {:>6}  {}  ({})",
        course.id,
        format_duration(course.duration_seconds),
        course.title,
        course.category,
    )
}

pub fn next_courses(courses: &[&'static Course]) -> String {
    if courses.is_empty() {
        return "Vous avez donné votre avis sur tous les cours. Merci !".to_string();
    }
    let mut out = String::from("Autres cours disponibles (pick <ID>):\n");
    for course in courses {
        let _ = writeln!(out, "{}", course_line(course));
    }
    out.trim_end().to_string()
}

pub fn feedback_unlocked(course: &Course) -> String {
    format!(
        "Formulaire d'avis débloqué pour « {} ». \
         Utilisez: feedback <1-5> \"commentaire\" [--pay oui|non|peut-etre] [--amount X]",
        course.title
    )
}

pub fn stage_prompt(stage: Stage) -> &'static str {
    match stage {
        Stage::CollectingIdentity => "Identifiez-vous: identity <prénom> <nom> <email>",
        Stage::SelectingCourse => "Choisissez un cours: pick <ID> (courses pour la liste)",
        Stage::Playing(_) => "Lecture: play, pause, seek, rate, status",
        Stage::FeedbackRevealed(_) => "Donnez votre avis: feedback ... (help pour l'aide)",
    }
}
