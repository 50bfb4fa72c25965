use std::io::{self, BufRead, Write};

use cellsheet::{Error, Position, Sheet};

const USAGE: &str = "commands: set <cell> <text> | clear <cell> | get <cell> | values | texts | size";

fn run(
    sheet: &mut Sheet,
    line: &str,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "set" => {
            let (cell, text) = rest.split_once(' ').unwrap_or((rest, ""));
            sheet.set_cell(cell.parse()?, text)?;
        }
        "clear" => sheet.clear_cell(rest.trim().parse()?)?,
        "get" => {
            let pos: Position = rest.trim().parse()?;
            match sheet.get_cell(pos)? {
                Some(cell) => writeln!(out, "{} = {}", cell.text(), cell.value())?,
                None => writeln!(out, "{pos} is empty")?,
            }
        }
        "values" => sheet.print_values(out)?,
        "texts" => sheet.print_texts(out)?,
        "size" => {
            let size = sheet.printable_size();
            writeln!(out, "{} x {}", size.rows, size.cols)?;
        }
        _ => writeln!(out, "{USAGE}")?,
    }
    Ok(())
}

fn main() -> io::Result<()> {
    let mut sheet = Sheet::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim_start();
        if line.is_empty() {
            continue;
        }
        if let Err(err) = run(&mut sheet, line, &mut stdout) {
            match err.downcast_ref::<Error>() {
                Some(Error::CircularDependency(pos)) => {
                    eprintln!("{pos} would depend on itself, not changed")
                }
                _ => eprintln!("error: {err}"),
            }
        }
    }
    Ok(())
}
