pub mod frontend;
pub mod headless;
pub mod input;
pub mod viewer;
pub mod window;
