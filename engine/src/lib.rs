// #![deny(unused_imports)]
// #![deny(unused)]

pub mod app;
pub mod broker;
pub mod camera;
pub mod clocks;
pub mod config;
pub mod fps_counter;
pub mod light;
pub mod pick;
pub mod pose;
pub mod render;
pub mod rig;
pub mod scene;
pub mod session;
pub mod skeleton;
pub mod skin;

pub use self::{
    app::{App, AppEvent, MeasurementResult},
    config::Config,
};
