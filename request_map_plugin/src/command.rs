/// Chat command recognized by the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowMaps,
    RequestMap(Selector),
    Approve,
    Abort,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Literal rotation index.
    Index(usize),
    /// Case-insensitive substring tokens matched against display names.
    Words(Vec<String>),
}

pub fn parse(line: &str) -> Command {
    let Some(rest) = line.strip_prefix(&['!', '/'][..]) else {
        return Command::None;
    };

    let (keyword, args) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };

    match keyword {
        "maps" => Command::ShowMaps,
        "request" => Command::RequestMap(parse_selector(args)),
        "approve" => Command::Approve,
        "abort" => Command::Abort,
        _ => Command::None,
    }
}

fn parse_selector(args: &str) -> Selector {
    let args = args.trim_start();

    let digits: String = args.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        if let Ok(index) = digits.parse::<usize>() {
            return Selector::Index(index);
        }
    }

    let words: String = args
        .chars()
        .take_while(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect();
    Selector::Words(words.split_whitespace().map(str::to_string).collect())
}
