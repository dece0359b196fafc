pub mod build_info;
pub mod launcher;
pub mod page;
pub mod settings;
pub mod update;

#[cfg(test)]
mod testing;
