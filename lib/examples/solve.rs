use anyhow::{Context, Result};
use boggle_ocr::{Config, DictionaryIndex, Pipeline, TemplateLibrary};
use std::sync::Arc;

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let usage = "Usage: solve IMAGE WORDLIST [TEMPLATE_DIR] [CONFIG_TOML]";
    let image_path = args.next().context(usage)?;
    let wordlist = args.next().context(usage)?;
    let template_dir = args.next().unwrap_or_else(|| "templates".to_string());

    let config = match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path))?;
            Config::from_toml_str(&text)?
        }
        None => Config::default(),
    };
    let dictionary = DictionaryIndex::from_file(&wordlist, config.solver.min_word_length)?;
    eprintln!("{} words in {}", dictionary.len(), wordlist);
    let templates = TemplateLibrary::load_dir(&template_dir, config.recognizer.template_size);

    let pipeline = Pipeline::new(config, Arc::new(dictionary), templates).with_tesseract();
    let result = pipeline
        .process_file(&image_path)
        .with_context(|| format!("Failed to process {}", image_path))?;
    eprintln!("{}\n", result.board);
    for cell in result.cells.iter().filter(|cell| cell.is_disagreement()) {
        eprintln!(
            "  ({}, {}): template {:?}, model {:?}",
            cell.row, cell.col, cell.template, cell.model
        );
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{:?}", err);
        std::process::exit(1);
    }
}
