use std::collections::HashSet;

use chrono::Utc;

use crate::db::gamification_repository::GamificationRepository;
use crate::db::models::{new_id, Medal, MedalCriterion, User, UserMedal};
use crate::db::user_repository::{Progress, UserRepository};
use crate::error::AppError;

/// Medal catalogue inserted by the seeder.
pub fn default_medals() -> Vec<Medal> {
    let medal = |code: &str, name: &str, description: &str, icon: &str, criterion| Medal {
        id: new_id(),
        code: code.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: Some(icon.to_string()),
        criterion,
    };

    vec![
        medal(
            "first-report",
            "First Report",
            "Reported a first near-miss incident",
            "🛎️",
            MedalCriterion::IncidentsReported(1),
        ),
        medal(
            "vigilant",
            "Vigilant",
            "Reported ten near-miss incidents",
            "👁️",
            MedalCriterion::IncidentsReported(10),
        ),
        medal(
            "learner",
            "Learner",
            "Watched a first training video",
            "🎬",
            MedalCriterion::VideosWatched(1),
        ),
        medal(
            "scholar",
            "Scholar",
            "Watched ten training videos",
            "🎓",
            MedalCriterion::VideosWatched(10),
        ),
        medal(
            "safety-100",
            "Safety Champion",
            "Reached 100 points",
            "🏆",
            MedalCriterion::Points(100),
        ),
    ]
}

/// Award every medal `user` qualifies for and doesn't hold yet.
///
/// Returns the medals awarded by this call.
pub async fn evaluate_medals(
    gamification: &dyn GamificationRepository,
    user: &User,
) -> Result<Vec<Medal>, AppError> {
    let held: HashSet<String> = gamification
        .awards_of(&user.id)
        .await?
        .into_iter()
        .map(|a| a.medal_id)
        .collect();

    let mut awarded = Vec::new();
    for medal in gamification.list_medals().await? {
        if held.contains(&medal.id) || !medal.criterion.is_met_by(user) {
            continue;
        }

        let granted = gamification
            .award(UserMedal {
                id: new_id(),
                user_id: user.id.clone(),
                medal_id: medal.id.clone(),
                awarded_at: Utc::now(),
            })
            .await?;

        // A concurrent request may have awarded it first.
        if granted {
            tracing::info!(user_id = %user.id, medal = %medal.code, "Medal awarded");
            awarded.push(medal);
        }
    }

    Ok(awarded)
}

/// Apply counter increments to a user and re-evaluate medals.
pub async fn apply_progress(
    users: &dyn UserRepository,
    gamification: &dyn GamificationRepository,
    user_id: &str,
    progress: Progress,
) -> Result<(User, Vec<Medal>), AppError> {
    let user = users.add_progress(user_id, progress).await?;
    let awarded = evaluate_medals(gamification, &user).await?;
    Ok((user, awarded))
}
