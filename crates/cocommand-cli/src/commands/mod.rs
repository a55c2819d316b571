pub mod events;
pub mod repl;
pub mod run;
pub mod tool;
pub mod workspace;
