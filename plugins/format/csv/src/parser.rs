use tessera_api::{Error, Result};

// ═══════════════════════════════════════════════════════════════
//  RFC 4180 field parser
// ═══════════════════════════════════════════════════════════════

/// Split one record line into fields. With `quoting`, a field wrapped in
/// `"` may contain the delimiter and `""` stands for a literal quote.
pub(crate) fn parse_fields(line: &str, delimiter: char, quoting: bool) -> Vec<String> {
    if !quoting {
        return line.split(delimiter).map(str::to_string).collect();
    }

    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    let mut field = String::new();

    loop {
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                if c != '"' {
                    field.push(c);
                } else if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    break;
                }
            }
            // Anything between the closing quote and the delimiter is dropped.
            for c in chars.by_ref() {
                if c == delimiter {
                    break;
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == delimiter {
                    break;
                }
                field.push(c);
            }
        }

        fields.push(std::mem::take(&mut field));

        if chars.peek().is_none() {
            if line.ends_with(delimiter) {
                fields.push(String::new());
            }
            break;
        }
    }

    fields
}

/// True when `text` ends inside a quoted field, so the record continues on
/// the next physical line.
pub(crate) fn quote_is_open(text: &str, delimiter: char) -> bool {
    let mut chars = text.chars().peekable();
    let mut field_start = true;
    let mut quoted = false;
    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            continue;
        }
        if c == '"' && field_start {
            quoted = true;
        }
        field_start = c == delimiter || c == '\n';
    }
    quoted
}

/// Quote `field` if it contains the delimiter, a quote or a line break.
pub(crate) fn quote_field(field: &str, delimiter: char, quoting: bool) -> String {
    let special = field.contains(delimiter) || field.contains('"') || field.contains('\n') || field.contains('\r');
    if quoting && special {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub(crate) fn parse_delimiter(s: &str) -> Result<char> {
    let mut chars = s.chars();
    match (s, chars.next(), chars.next()) {
        ("\\t", _, _) => Ok('\t'),
        (_, Some(c), None) if c != '"' && c != '\n' => Ok(c),
        (other, _, _) => Err(Error::config(format!("csv: delimiter must be a single character, got {other:?}"))),
    }
}
