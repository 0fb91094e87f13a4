use std::error::Error;
use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use ifu_io::Container;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Product file to describe.
    pub file: PathBuf,
    /// Only list sections and payload shapes.
    #[arg(long)]
    pub brief: bool,
}

pub fn run(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let container = Container::read(&args.file)?;
    print!("{}", describe(&container, args.brief)?);
    Ok(())
}

fn describe(container: &Container, brief: bool) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    for (index, section) in container.sections.iter().enumerate() {
        let shape = section.shape();
        if shape.is_empty() {
            writeln!(out, "[{index}] header only, {} cards", section.header.len())?;
        } else {
            writeln!(out, "[{index}] payload {shape:?}, {} cards", section.header.len())?;
        }
        if brief {
            continue;
        }
        for card in section.header.cards() {
            match &card.comment {
                Some(comment) => writeln!(out, "    {:<8} = {} / {comment}", card.key, card.value)?,
                None => writeln!(out, "    {:<8} = {}", card.key, card.value)?,
            }
        }
    }
    Ok(out)
}
