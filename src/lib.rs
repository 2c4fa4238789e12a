//! Look up the current weather for a city, by name

pub mod app;
pub mod city;
pub mod config;
pub mod display;
pub mod http;
pub mod lookup;
pub mod state;
pub mod weather;
