//! Ledger tokenizer.
//!
//! A three-state machine over the raw text:
//!
//! * `Field`   – plain characters; `,` ends a field, `\n` ends a record,
//!   `\r` moves to `LineEnd`, `"` opens a quoted section.
//! * `Quoted`  – everything is literal (separators and newlines included);
//!   `""` is an escaped quote, a lone `"` returns to `Field`.
//! * `LineEnd` – a `\r` was seen; a following `\n` belongs to the same
//!   terminator, anything else ends the record and is re-read as `Field`.
//!
//! Unterminated quotes are flushed as-is at end of input. Blank lines are
//! dropped.

use std::mem::take;

pub const SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub fields: Vec<String>,
    /// Byte offset just past this record's line terminator.
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Field,
    Quoted,
    LineEnd,
}

pub fn tokenize(text: &str) -> Vec<Record> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut records = Vec::new();
    let mut field = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut state = State::Field;
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        match state {
            State::Field => match ch {
                '"' => state = State::Quoted,
                c if c == SEPARATOR => row.push(take(&mut field)),
                '\n' => {
                    row.push(take(&mut field));
                    finish(&mut records, &mut row, pos + 1);
                }
                '\r' => state = State::LineEnd,
                c => field.push(c),
            },
            State::Quoted => match ch {
                '"' => {
                    if matches!(chars.get(i + 1), Some((_, '"'))) {
                        field.push('"');
                        i += 1;
                    } else {
                        state = State::Field;
                    }
                }
                c => field.push(c),
            },
            State::LineEnd => {
                row.push(take(&mut field));
                state = State::Field;
                if ch == '\n' {
                    finish(&mut records, &mut row, pos + 1);
                } else {
                    finish(&mut records, &mut row, pos);
                    // Re-read this char as the start of the next record.
                    continue;
                }
            }
        }
        i += 1;
    }

    if state == State::LineEnd || !field.is_empty() || !row.is_empty() {
        row.push(field);
        finish(&mut records, &mut row, text.len());
    }
    records
}

/// Convenience: just the field rows.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    tokenize(text).into_iter().map(|r| r.fields).collect()
}

fn finish(records: &mut Vec<Record>, row: &mut Vec<String>, end: usize) {
    let fields = take(row);
    if fields.len() == 1 && fields[0].is_empty() {
        return;
    }
    records.push(Record { fields, end });
}
