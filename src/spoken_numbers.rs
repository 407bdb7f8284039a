//! Spoken-number normalization for transcripts.
//!
//! Speech-to-text often spells numbers out ("one thirty over ninety"). This
//! rewrites number words as digits so the vital grammars only deal with
//! digits. Words that are not part of a number pass through unchanged.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberWord {
    Unit(u64),
    Teen(u64),
    Tens(u64),
    Hundred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    Unit,
    Teen,
    Tens,
    Hundred,
    Complete,
}

/// A number being assembled from consecutive words.
#[derive(Debug)]
struct NumberBuilder {
    value: u64,
    last: Last,
    decimals: Option<String>,
}

impl NumberBuilder {
    fn start(word: NumberWord) -> Self {
        let (value, last) = match word {
            NumberWord::Unit(u) => (u, Last::Unit),
            NumberWord::Teen(t) => (t, Last::Teen),
            NumberWord::Tens(t) => (t, Last::Tens),
            NumberWord::Hundred => (100, Last::Hundred),
        };
        Self {
            value,
            last,
            decimals: None,
        }
    }

    /// Try to extend the number with the next word.
    fn absorb(&mut self, word: NumberWord) -> bool {
        if let Some(decimals) = self.decimals.as_mut() {
            if let NumberWord::Unit(d) = word {
                decimals.push_str(&d.to_string());
                return true;
            }
            return false;
        }

        match (self.last, word) {
            (Last::Unit, NumberWord::Hundred) => {
                self.value *= 100;
                self.last = Last::Hundred;
            }
            // Clinical shorthand: "one ten" is 110, "one thirty" is 130.
            (Last::Unit, NumberWord::Teen(t)) if self.value > 0 => {
                self.value = self.value * 100 + t;
                self.last = Last::Teen;
            }
            (Last::Unit, NumberWord::Tens(t)) if self.value > 0 => {
                self.value = self.value * 100 + t;
                self.last = Last::Tens;
            }
            (Last::Tens, NumberWord::Unit(u)) if u > 0 => {
                self.value += u;
                self.last = Last::Complete;
            }
            (Last::Hundred, NumberWord::Unit(u)) if u > 0 => {
                self.value += u;
                self.last = Last::Complete;
            }
            (Last::Hundred, NumberWord::Teen(t)) => {
                self.value += t;
                self.last = Last::Teen;
            }
            (Last::Hundred, NumberWord::Tens(t)) => {
                self.value += t;
                self.last = Last::Tens;
            }
            _ => return false,
        }
        true
    }

    fn render(&self) -> String {
        match &self.decimals {
            Some(decimals) if !decimals.is_empty() => format!("{}.{}", self.value, decimals),
            _ => self.value.to_string(),
        }
    }
}

fn classify(word: &str) -> Option<NumberWord> {
    let word = match word {
        "zero" => NumberWord::Unit(0),
        "one" => NumberWord::Unit(1),
        "two" => NumberWord::Unit(2),
        "three" => NumberWord::Unit(3),
        "four" => NumberWord::Unit(4),
        "five" => NumberWord::Unit(5),
        "six" => NumberWord::Unit(6),
        "seven" => NumberWord::Unit(7),
        "eight" => NumberWord::Unit(8),
        "nine" => NumberWord::Unit(9),
        "ten" => NumberWord::Teen(10),
        "eleven" => NumberWord::Teen(11),
        "twelve" => NumberWord::Teen(12),
        "thirteen" => NumberWord::Teen(13),
        "fourteen" => NumberWord::Teen(14),
        "fifteen" => NumberWord::Teen(15),
        "sixteen" => NumberWord::Teen(16),
        "seventeen" => NumberWord::Teen(17),
        "eighteen" => NumberWord::Teen(18),
        "nineteen" => NumberWord::Teen(19),
        "twenty" => NumberWord::Tens(20),
        "thirty" => NumberWord::Tens(30),
        "forty" | "fourty" => NumberWord::Tens(40),
        "fifty" => NumberWord::Tens(50),
        "sixty" => NumberWord::Tens(60),
        "seventy" => NumberWord::Tens(70),
        "eighty" => NumberWord::Tens(80),
        "ninety" => NumberWord::Tens(90),
        "hundred" => NumberWord::Hundred,
        _ => return None,
    };
    Some(word)
}

/// Number words in a token, splitting hyphenated forms like "twenty-two".
fn number_words(core: &str) -> Option<Vec<NumberWord>> {
    let lower = core.to_ascii_lowercase();
    if lower.contains('-') {
        let parts: Option<Vec<NumberWord>> = lower.split('-').map(classify).collect();
        return parts.filter(|p| p.len() > 1);
    }
    classify(&lower).map(|w| vec![w])
}

fn split_suffix(token: &str) -> (&str, &str) {
    let core = token.trim_end_matches([',', '.', ';', ':', '!', '?']);
    (core, &token[core.len()..])
}

fn next_words(tokens: &[&str], index: usize) -> Option<Vec<NumberWord>> {
    tokens
        .get(index + 1)
        .and_then(|t| number_words(split_suffix(t).0))
}

fn flush(current: &mut Option<NumberBuilder>, out: &mut Vec<String>) {
    if let Some(builder) = current.take() {
        out.push(builder.render());
    }
}

fn feed(current: &mut Option<NumberBuilder>, out: &mut Vec<String>, word: NumberWord) {
    if let Some(builder) = current.as_mut() {
        if builder.absorb(word) {
            return;
        }
        flush(current, out);
    }
    *current = Some(NumberBuilder::start(word));
}

/// Rewrite spelled-out numbers as digits.
///
/// Whitespace is collapsed to single spaces. Consecutive single digits stay
/// separate numbers ("four five six" becomes "4 5 6").
pub fn normalize(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut current: Option<NumberBuilder> = None;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let (core, suffix) = split_suffix(token);

        if let Some(words) = number_words(core) {
            for word in words {
                feed(&mut current, &mut out, word);
            }
            if !suffix.is_empty() {
                flush(&mut current, &mut out);
                if let Some(last) = out.last_mut() {
                    last.push_str(suffix);
                }
            }
            i += 1;
            continue;
        }

        let lower = core.to_ascii_lowercase();
        if suffix.is_empty() {
            if let Some(builder) = current.as_mut() {
                // "one hundred and one"
                if lower == "and" && builder.last == Last::Hundred && next_words(&tokens, i).is_some()
                {
                    i += 1;
                    continue;
                }
                // "ninety eight point six"
                let next_is_digit = matches!(
                    next_words(&tokens, i).as_deref(),
                    Some([NumberWord::Unit(_), ..])
                );
                if (lower == "point" || lower == "dot") && builder.decimals.is_none() && next_is_digit
                {
                    builder.decimals = Some(String::new());
                    i += 1;
                    continue;
                }
            }
        }

        flush(&mut current, &mut out);
        out.push(token.to_string());
        i += 1;
    }
    flush(&mut current, &mut out);

    out.join(" ")
}
