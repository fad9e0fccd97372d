//! `hai --list-providers`.

use hai_ai::{create_provider, ProviderInfo, ProviderKind, ProviderManager, ProvidersConfig};

use crate::config::HaiConfig;

/// One listing line: marker, provider summary and probe result.
pub(crate) fn format_entry(info: &ProviderInfo, current: ProviderKind, available: bool) -> String {
    let marker = if info.kind == current { "*" } else { " " };
    let status = if available { "available" } else { "unavailable" };
    format!("{} {} - {}", marker, info, status)
}

async fn probe(providers: &ProvidersConfig, kind: ProviderKind) -> bool {
    let Some(config) = providers.get(kind) else {
        return false;
    };
    match create_provider(config) {
        Ok(provider) => provider.is_available().await,
        Err(_) => false,
    }
}

pub(crate) async fn run(config: &HaiConfig) -> miette::Result<()> {
    let selection = config.selection().map_err(|e| miette::miette!("{}", e))?;
    let manager = ProviderManager::new(config.providers.clone(), &selection)
        .map_err(|e| miette::miette!("{}", e))?;

    println!("Configured providers:");
    for info in manager.list_available_providers() {
        let available = probe(manager.providers(), info.kind).await;
        println!("{}", format_entry(&info, manager.current_kind(), available));
    }
    println!();
    println!(
        "Candidates, in order: {}",
        selection
            .candidates()
            .iter()
            .map(ProviderKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry() {
        let info = ProviderInfo {
            kind: ProviderKind::Ollama,
            model: "llama3.2".to_string(),
            detail: Some("http://localhost:11434".to_string()),
        };
        assert_eq!(
            format_entry(&info, ProviderKind::Ollama, true),
            "* ollama (llama3.2) [http://localhost:11434] - available"
        );
        assert_eq!(
            format_entry(&info, ProviderKind::OpenAi, false),
            "  ollama (llama3.2) [http://localhost:11434] - unavailable"
        );
    }
}
