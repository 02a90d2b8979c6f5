pub mod events;
pub mod geometry_utils;
pub mod pipeline_config;
pub mod replay_interface;
pub mod systems;
pub mod tracking;

#[cfg(test)]
mod fixtures;

pub type Point2D = (f32, f32);
