mod atomic_io;
mod file;

pub use file::{read_level, write_level, LevelDocument, LevelFileError, INTERACTABLES_LAYER};
