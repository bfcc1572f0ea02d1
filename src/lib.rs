pub mod app;
pub mod config;
pub mod error;
pub mod seeder;

pub mod api {
    pub mod auth;
    pub mod chatbot;
    pub mod documents;
    pub mod errors;
    pub mod files;
    pub mod form;
    pub mod gamification;
    pub mod health;
    pub mod incidents;
    pub mod interactions;
    pub mod stats;
    pub mod videos;
    pub mod zones;
}

pub mod auth {
    pub mod extractor;
    pub mod models;
    pub mod password;
    pub mod token;
}

pub mod chatbot {
    pub mod wizard;
}

pub mod db {
    pub mod document_repository;
    pub mod filters;
    pub mod gamification_repository;
    pub mod incident_repository;
    pub mod interaction_repository;
    pub mod models;
    pub mod pagination;
    pub mod user_repository;
    pub mod video_repository;
    pub mod zone_repository;
}

pub mod gamification {
    pub mod leaderboard;
    pub mod medals;
}

pub mod storage {
    pub mod client;
}

pub mod video {
    pub mod pipeline;
    pub mod transcoder;
}

#[cfg(test)]
pub(crate) mod testing;
