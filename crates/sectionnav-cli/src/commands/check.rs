use anyhow::{bail, Result};

use sectionnav_core::hash::{parse_hash, resolve_hash};
use sectionnav_core::{NavConfig, SectionId};

pub fn run(config: &NavConfig, raw: &str, sections: Vec<String>) -> Result<()> {
    let known: Vec<SectionId> = if sections.is_empty() {
        config.sections.known.clone()
    } else {
        sections
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(SectionId::from)
            .collect()
    };

    if known.is_empty() {
        bail!("No sections to check against. Pass --sections or set sections.known in the config.");
    }

    let candidate = parse_hash(raw);
    let Some(resolved) = resolve_hash(raw, &known) else {
        bail!("Fragment {raw:?} did not resolve");
    };

    match candidate {
        Some(candidate) if candidate == resolved.as_str() => {
            println!("{} -> {}", raw, resolved);
        }
        Some(candidate) => {
            println!("{} -> {} (unknown section {:?}, using the first section)", raw, resolved, candidate);
        }
        None => {
            println!("{:?} -> {} (empty fragment, using the first section)", raw, resolved);
        }
    }

    Ok(())
}
