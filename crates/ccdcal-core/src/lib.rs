pub mod bias;
pub mod camera;
pub mod consts;
pub mod error;
pub mod frame;
pub mod group;
pub mod io;
pub mod noise;
pub mod pipeline;
pub mod ptc;
pub mod result;
pub mod taps;
