// YouTube Playlists - Library root for testing

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod models;
pub mod playlists;
pub mod routes;
pub mod views;
pub mod youtube;
