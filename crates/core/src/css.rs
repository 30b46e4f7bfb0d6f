//! CSS identifier escaping and a small selector engine
//!
//! Covers the selector subset the anchor codec emits plus a little more so
//! that hand-written locators keep working:
//!
//! - type selectors and `*`
//! - `#id` and `.class`
//! - `:nth-of-type(n)`, `:nth-of-type(odd)`, `:nth-of-type(even)`
//! - child (`>`) and descendant (whitespace) combinators
//! - selector lists (`a, b`)
//!
//! Anything else is rejected with [`SelectorError::InvalidSelector`], the same
//! way a browser's `querySelector` throws on syntax it does not understand.

use crate::dom::Dom;
use std::fmt::Write as _;
use thiserror::Error;

/// Errors that can occur during selector resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// Invalid selector syntax
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The document could not run the query
    #[error("selector query failed: {0}")]
    Backend(String),
}

/// Serialize `ident` as a CSS identifier, following CSSOM `CSS.escape`
pub fn escape_identifier(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());

    for (index, &ch) in chars.iter().enumerate() {
        let code = ch as u32;
        if ch == '\0' {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1F).contains(&code)
            || code == 0x7F
            || (index == 0 && ch.is_ascii_digit())
            || (index == 1 && ch.is_ascii_digit() && chars[0] == '-')
        {
            let _ = write!(out, "\\{code:x} ");
        } else if index == 0 && ch == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || ch == '-' || ch == '_' || ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }

    out
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    /// Left to right
    compounds: Vec<CompoundSelector>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Child,
    Descendant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CompoundSelector {
    /// Lower-cased tag name; `None` matches any element
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    nth_of_type: Vec<NthOfType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NthOfType {
    Index(usize),
    Odd,
    Even,
}

impl NthOfType {
    fn matches(self, position: usize) -> bool {
        match self {
            NthOfType::Index(index) => index == position,
            NthOfType::Odd => position % 2 == 1,
            NthOfType::Even => position % 2 == 0,
        }
    }
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        Parser::new(selector).parse_list()
    }

    /// Whether `element` matches any selector of the list
    pub fn matches<D: Dom + ?Sized>(&self, dom: &D, element: &D::Element) -> bool {
        self.selectors.iter().any(|selector| selector.matches(dom, element))
    }
}

impl ComplexSelector {
    fn matches<D: Dom + ?Sized>(&self, dom: &D, element: &D::Element) -> bool {
        self.matches_from(dom, element, self.compounds.len() - 1)
    }

    fn matches_from<D: Dom + ?Sized>(&self, dom: &D, element: &D::Element, index: usize) -> bool {
        if !self.compounds[index].matches(dom, element) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => dom
                .parent_element(element)
                .is_some_and(|parent| self.matches_from(dom, &parent, index - 1)),
            Combinator::Descendant => {
                let mut ancestor = dom.parent_element(element);
                while let Some(current) = ancestor {
                    if self.matches_from(dom, &current, index - 1) {
                        return true;
                    }
                    ancestor = dom.parent_element(&current);
                }
                false
            }
        }
    }
}

impl CompoundSelector {
    fn matches<D: Dom + ?Sized>(&self, dom: &D, element: &D::Element) -> bool {
        if let Some(tag) = &self.tag {
            if !dom.tag_name(element).eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if !self.ids.is_empty() {
            let id = dom.id(element);
            if !self.ids.iter().all(|wanted| id.as_deref() == Some(wanted.as_str())) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let classes = dom.class_list(element);
            if !self.classes.iter().all(|wanted| classes.iter().any(|class| class == wanted)) {
                return false;
            }
        }

        if !self.nth_of_type.is_empty() {
            let position = position_of_type(dom, element);
            if !self.nth_of_type.iter().all(|nth| nth.matches(position)) {
                return false;
            }
        }

        true
    }
}

/// 1-based index of `element` among its parent's children with the same tag
pub fn position_of_type<D: Dom + ?Sized>(dom: &D, element: &D::Element) -> usize {
    let Some(parent) = dom.parent_element(element) else {
        return 1;
    };

    let tag = dom.tag_name(element);
    dom.children(&parent)
        .into_iter()
        .filter(|sibling| dom.tag_name(sibling).eq_ignore_ascii_case(&tag))
        .position(|sibling| &sibling == element)
        .map_or(1, |index| index + 1)
}

/// Run `selectors` against the whole document, in document order
pub fn query_all<D: Dom + ?Sized>(dom: &D, selectors: &SelectorList) -> Vec<D::Element> {
    let mut matches = Vec::new();
    let mut stack: Vec<D::Element> = dom.document_element().into_iter().collect();

    while let Some(element) = stack.pop() {
        if selectors.matches(dom, &element) {
            matches.push(element.clone());
        }
        let mut children = dom.children(&element);
        children.reverse();
        stack.extend(children);
    }

    matches
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, chars: source.chars().collect(), pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> SelectorError {
        SelectorError::InvalidSelector { selector: self.source.to_owned(), reason: reason.into() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn expect(&mut self, wanted: char) -> Result<(), SelectorError> {
        if self.peek() == Some(wanted) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{wanted}' at offset {}", self.pos)))
        }
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(self.error("empty selector"));
        }

        let mut selectors = Vec::new();
        loop {
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                    self.skip_whitespace();
                }
                Some(other) => return Err(self.error(format!("unexpected '{other}'"))),
            }
        }

        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_whitespace => Combinator::Descendant,
                Some(other) => return Err(self.error(format!("unexpected '{other}'"))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(ComplexSelector { compounds, combinators })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut compound = CompoundSelector::default();
        let mut empty = true;

        if self.peek() == Some('*') {
            self.pos += 1;
            empty = false;
        } else if self.at_ident_start() {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            empty = false;
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some(':') => {
                    self.pos += 1;
                    let name = self.parse_ident()?;
                    if !name.eq_ignore_ascii_case("nth-of-type") {
                        return Err(self.error(format!("unsupported pseudo-class ':{name}'")));
                    }
                    compound.nth_of_type.push(self.parse_nth_argument()?);
                }
                _ => break,
            }
            empty = false;
        }

        if empty {
            return Err(match self.peek() {
                Some(other) => self.error(format!("unexpected '{other}'")),
                None => self.error("selector ends with a combinator"),
            });
        }

        Ok(compound)
    }

    fn parse_nth_argument(&mut self) -> Result<NthOfType, SelectorError> {
        self.expect('(')?;
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch != ')') {
            self.pos += 1;
        }
        let argument: String = self.chars[start..self.pos].iter().collect();
        self.expect(')')?;

        let argument = argument.trim();
        if argument.eq_ignore_ascii_case("odd") {
            return Ok(NthOfType::Odd);
        }
        if argument.eq_ignore_ascii_case("even") {
            return Ok(NthOfType::Even);
        }

        let digits = argument.strip_prefix('+').unwrap_or(argument);
        if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(self.error(format!("unsupported :nth-of-type argument '{argument}'")));
        }
        digits
            .parse::<usize>()
            .map(NthOfType::Index)
            .map_err(|_| self.error(format!("index out of range '{argument}'")))
    }

    fn at_valid_escape(&self, offset: usize) -> bool {
        self.peek_at(offset) == Some('\\') && self.peek_at(offset + 1).is_some_and(|ch| ch != '\n')
    }

    fn at_ident_start(&self) -> bool {
        match self.peek() {
            Some('-') => match self.peek_at(1) {
                Some(next) if next == '-' || is_name_start(next) => true,
                Some('\\') => self.at_valid_escape(1),
                _ => false,
            },
            Some('\\') => self.at_valid_escape(0),
            Some(ch) => is_name_start(ch),
            None => false,
        }
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        if !self.at_ident_start() {
            return Err(self.error(format!("expected identifier at offset {}", self.pos)));
        }

        let mut ident = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.pos += 1;
                ident.push(self.consume_escape()?);
            } else if is_name_char(ch) {
                self.pos += 1;
                ident.push(ch);
            } else {
                break;
            }
        }

        Ok(ident)
    }

    /// Called with the cursor just past the backslash
    fn consume_escape(&mut self) -> Result<char, SelectorError> {
        let Some(first) = self.peek() else {
            return Err(self.error("escape at end of input"));
        };

        if first == '\n' {
            return Err(self.error("escaped newline in identifier"));
        }

        if !first.is_ascii_hexdigit() {
            self.pos += 1;
            return Ok(first);
        }

        let mut code = 0u32;
        let mut digits = 0;
        while digits < 6 {
            let Some(digit) = self.peek().and_then(|ch| ch.to_digit(16)) else {
                break;
            };
            code = code * 16 + digit;
            digits += 1;
            self.pos += 1;
        }

        // One whitespace terminates a hex escape
        if self.peek() == Some('\r') && self.peek_at(1) == Some('\n') {
            self.pos += 2;
        } else if self.peek().is_some_and(is_whitespace) {
            self.pos += 1;
        }

        if code == 0 {
            return Ok('\u{FFFD}');
        }
        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\u{000C}')
}

fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || !ch.is_ascii()
}

fn is_name_char(ch: char) -> bool {
    is_name_start(ch) || ch.is_ascii_digit() || ch == '-'
}
