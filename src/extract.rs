//! `assistant extract`: run the gated lead extractor on a piece of text
//! without recording anything.

use anyhow::Result;

use crate::config::Config;
use crate::leads::LeadExtractor;
use crate::llm::create_text_extractor;

pub async fn run_extract(config: &Config, text: &str) -> Result<()> {
    let gate = config.matching.phone_gate()?;
    let extractor = create_text_extractor(&config.llm, &gate)?;
    let name = extractor.name().to_string();
    let leads = LeadExtractor::new(gate, extractor);

    match leads.gate().find(text) {
        Some(phone) => println!("phone gate: matched \"{}\"", phone),
        None => {
            println!("phone gate: no match (extractor not called)");
            return Ok(());
        }
    }

    match leads.try_extract(text).await {
        Some(lead) => {
            println!("extractor: {}", name);
            println!("    name: {}", lead.name);
            println!("    phone: {}", lead.phone);
        }
        None => println!("extractor: {} found no lead", name),
    }

    Ok(())
}
