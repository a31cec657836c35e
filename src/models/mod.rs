// Data models for the YouTube Data API and the JSON routes

pub mod youtube;
