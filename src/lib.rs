pub mod rendering;
pub mod settings;
pub mod terrain;
pub mod util;
