//! `hai memory stats|clear`.

use hai_memory::MemoryManager;

use crate::config::HaiConfig;

fn load(config: &HaiConfig) -> MemoryManager {
    let mut memory = MemoryManager::new(config.memory.clone());
    memory.load_all();
    memory
}

pub(crate) fn stats(config: &HaiConfig) -> miette::Result<()> {
    let memory = load(config);
    println!("{}", memory.stats());
    if let Some(dir) = memory.working_dir() {
        println!("Project root:        {}", dir.display());
    }
    if let Some(path) = memory.preferences().path() {
        println!("Preferences file:    {}", path.display());
    }
    Ok(())
}

pub(crate) fn clear(config: &HaiConfig) -> miette::Result<()> {
    let mut memory = load(config);
    if !memory.enabled() {
        return Err(miette::miette!("memory is disabled in the configuration"));
    }
    memory.clear_all();
    memory.save_all();
    println!("Memory cleared.");
    Ok(())
}
