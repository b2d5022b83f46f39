/*!

The textual notation: a postfix (reverse-Polish) encoding over entries, back-references, and
operators, per §4.8. `save_string` serialises a reference; `load_string_safe`/`load_string_fast`
parse it back, the former routing every operator through the full normaliser, the latter
assuming the text is already canonical and interning directly via `add_basic_node`.

*/

use crate::error::{Error, FormatError, Result};
use crate::graph::Graph;
use crate::node::{classify, Variant, IBIT};
use qdag_abs::VersionedMap;

/// Encodes a 0-based placeholder index in the base-26 letter alphabet used for entries and
/// back-references: `a..z`, then `Aa..Zz`, etc. (uppercase digits prefix a lowercase unit digit).
fn encode_base26(mut index: u32, out: &mut String) {
  let mut digits = Vec::new();
  digits.push((index % 26) as u8);
  index /= 26;
  while index > 0 {
    index -= 1;
    digits.push((index % 26) as u8);
    index /= 26;
  }
  for (i, &digit) in digits.iter().enumerate().rev() {
    let upper = i != 0;
    let ch = (if upper { b'A' } else { b'a' } + digit) as char;
    out.push(ch);
  }
}

/// Prints `reference` in postfix notation. Performs a two-pass DFS: the first pass (implicit,
/// via post-order recursion) assigns each internal node an output slot number the first time it
/// is visited; the second pass, driven by the same recursion, emits operators referencing
/// earlier slots by backward distance.
pub fn save_string(graph: &Graph, reference: u32) -> String {
  let mut out = String::new();
  let mut slot_of: VersionedMap<u32> = VersionedMap::new(graph.ncount() as usize);
  let mut next_slot = 0u32;
  emit(graph, reference & !IBIT, &mut out, &mut slot_of, &mut next_slot);
  if reference & IBIT != 0 {
    out.push('~');
  }
  out
}

fn emit(graph: &Graph, id: u32, out: &mut String, slot_of: &mut VersionedMap<u32>, next_slot: &mut u32) {
  if id == 0 {
    out.push('0');
    return;
  }
  if graph.is_entry(id) {
    encode_base26(id - 1, out);
    return;
  }
  if let Some(slot) = slot_of.get(id as usize) {
    // Back-reference: distance from the next slot about to be assigned to this node's slot.
    let distance = *next_slot - slot;
    out.push_str(&distance.to_string());
    return;
  }

  let node = graph.node(id);
  emit(graph, node.f, out, slot_of, next_slot);
  emit(graph, node.t & !IBIT, out, slot_of, next_slot);
  emit(graph, node.q, out, slot_of, next_slot);

  let op = match classify(node.t, node.f) {
    Variant::Or => '+',
    Variant::Gt => '>',
    Variant::Ne => '^',
    Variant::And => '&',
    Variant::QnTF => '!',
    Variant::QTF => '?',
    Variant::Const0 | Variant::Entry => unreachable!("internal node cannot classify as a leaf"),
  };
  out.push(op);

  slot_of.set(id as usize, *next_slot);
  *next_slot += 1;
}

struct Parser<'a> {
  chars: std::iter::Peekable<std::str::Chars<'a>>,
  stack: Vec<u32>,
  emitted: Vec<u32>,
  pos: usize,
}

impl<'a> Parser<'a> {
  fn new(text: &'a str) -> Self {
    Parser { chars: text.chars().peekable(), stack: Vec::new(), emitted: Vec::new(), pos: 0 }
  }

  fn advance(&mut self) -> Option<char> {
    let ch = self.chars.next()?;
    self.pos += ch.len_utf8();
    Some(ch)
  }

  fn pop(&mut self) -> Result<u32> {
    let pos = self.pos;
    self
      .stack
      .pop()
      .ok_or_else(|| Error::Format(FormatError::Token { offset: pos, detail: "operator with empty stack" }))
  }
}

/// Parses one base-26 run (lower/uppercase letter sequence) starting at the current position,
/// consuming it, and returning its 0-based index.
fn parse_base26(parser: &mut Parser) -> u32 {
  let mut value = 0u32;
  loop {
    match parser.chars.peek() {
      Some(&c) if c.is_ascii_uppercase() => {
        value = value * 26 + (c as u32 - 'A' as u32) + 1;
        parser.advance();
      }
      Some(&c) if c.is_ascii_lowercase() => {
        value = value * 26 + (c as u32 - 'a' as u32);
        parser.advance();
        break;
      }
      _ => break,
    }
  }
  value
}

fn parse_digits(parser: &mut Parser) -> u32 {
  let mut value = 0u32;
  while let Some(&c) = parser.chars.peek() {
    if let Some(d) = c.to_digit(10) {
      value = value * 10 + d;
      parser.advance();
    } else {
      break;
    }
  }
  value
}

/// Parses `text`, calling `add_normalise_node` for every operator and `add_basic_node` directly
/// when `fast` is set (the text is assumed already canonical, e.g. when reloading a saved file).
fn load_string(graph: &mut Graph, text: &str, fast: bool) -> Result<u32> {
  let mut parser = Parser::new(text);

  while let Some(&ch) = parser.chars.peek() {
    match ch {
      '0' => {
        parser.advance();
        parser.stack.push(0);
      }
      'a'..='z' | 'A'..='Z' => {
        let index = parse_base26(&mut parser);
        parser.stack.push(index + 1);
      }
      '1'..='9' => {
        let offset = parser.pos;
        let distance = parse_digits(&mut parser);
        let len = parser.emitted.len();
        if distance as usize > len {
          return Err(Error::Format(FormatError::Token {
            offset,
            detail: "back-reference further back than anything emitted so far",
          }));
        }
        let id = parser.emitted[len - distance as usize];
        parser.stack.push(id);
      }
      '~' => {
        parser.advance();
        let top = parser.pop()?;
        parser.stack.push(top ^ IBIT);
      }
      '+' | '>' | '^' | '&' | '!' | '?' => {
        parser.advance();
        let f = parser.pop()?;
        let t = parser.pop()?;
        let q = parser.pop()?;
        let (qq, tt, ff) = match ch {
          '+' => (q, IBIT, f),
          '>' => (q, t | IBIT, 0),
          '^' => (q, t ^ IBIT, f),
          '&' => (q, t, 0),
          '!' => (q, t ^ IBIT, f),
          '?' => (q, t, f),
          _ => unreachable!(),
        };
        let id = if fast {
          graph.add_basic_node(qq, tt, ff)?
        } else {
          graph.add_normalise_node(qq, tt, ff)?.raw()
        };
        parser.stack.push(id);
        parser.emitted.push(id & !IBIT);
      }
      '/' => {
        // Transform marker: a permutation of placeholders follows. Not needed for a single
        // `loadString` call in isolation; consumed and ignored here.
        parser.advance();
        while parser.chars.peek().is_some() {
          parser.advance();
        }
      }
      _ => {
        return Err(Error::Format(FormatError::Token {
          offset: parser.pos,
          detail: "unrecognised character in notation",
        }))
      }
    }
  }

  parser.pop()
}

pub fn load_string_safe(graph: &mut Graph, text: &str) -> Result<u32> {
  load_string(graph, text, false)
}

pub fn load_string_fast(graph: &mut Graph, text: &str) -> Result<u32> {
  load_string(graph, text, true)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::flags::default_flags;
  use crate::store::Dimensions;

  fn small_graph() -> Graph {
    let dims = Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 64 };
    Graph::new(dims, 1, default_flags(), Context::default()).unwrap()
  }

  #[test]
  fn or_of_two_entries_round_trips_through_text() {
    let mut g = small_graph();
    let a = 1u32;
    let b = 2u32;
    let or_ref = g.add_normalise_node(a, IBIT, b).unwrap().raw();
    let text = save_string(&g, or_ref);
    assert_eq!(text, "ab+");
    let back = load_string_safe(&mut g, &text).unwrap();
    assert_eq!(back, or_ref);
  }

  #[test]
  fn constant_false_prints_as_zero() {
    let g = small_graph();
    assert_eq!(save_string(&g, 0), "0");
  }
}
