pub mod colour;
pub mod command;
pub mod debug_buffer;
pub mod draw;
pub mod frame;
pub mod mixer;
pub mod moments;
pub mod morphology;
pub mod perspective;
pub mod pid;
pub mod strategy;
pub mod threshold;
