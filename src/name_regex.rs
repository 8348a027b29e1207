//! Name-Regex: a pattern language over *sequences of Name components*, not
//! over raw bytes. Grounded on `ndn.cxx/regex/regex-top-matcher.cc` and
//! `ndn.cxx/security/regex/regex-patternlist-matcher.cc`: a top matcher that
//! keeps a primary (anchored) and secondary (prefix-tolerant) compiled
//! pattern list, a back-reference manager numbered by opening paren order,
//! and an `expand` that walks a template string token by token.
use regex::Regex;

use crate::error::{NdnError, NdnResult};
use crate::name::Name;

#[derive(Debug, Clone)]
struct Quantifier {
    min: usize,
    max: Option<usize>,
}

impl Quantifier {
    const ONE: Quantifier = Quantifier { min: 1, max: Some(1) };

    fn matches_count(&self, n: usize) -> bool {
        n >= self.min && self.max.map(|m| n <= m).unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
enum Atom {
    /// `<component-regex>`: matches exactly one component whose URI form
    /// satisfies the inner regex.
    Component(Regex),
    /// `(pattern-list)`: a numbered back-reference group.
    Group(usize, PatternList),
}

#[derive(Debug, Clone)]
struct Repeat {
    atom: Atom,
    quantifier: Quantifier,
}

/// A compiled sequence of [`Repeat`]s, i.e. one `PatternList` production.
#[derive(Debug, Clone, Default)]
struct PatternList {
    repeats: Vec<Repeat>,
}

/// What a successful match produced: the full matched component sequence,
/// plus the component sequence captured by each numbered group.
#[derive(Debug, Clone, Default)]
struct MatchResult {
    whole: Vec<Vec<u8>>,
    groups: Vec<Vec<Vec<u8>>>,
}

/// Parses `expr` into a `PatternList`, tracking group numbering by the order
/// opening parens are seen (left-to-right), matching
/// `RegexPatternListMatcher::Compile`.
struct PatternParser<'a> {
    chars: Vec<char>,
    pos: usize,
    next_group: usize,
    src: &'a str,
}

impl<'a> PatternParser<'a> {
    fn new(src: &'a str) -> Self {
        PatternParser { chars: src.chars().collect(), pos: 0, next_group: 1, src }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_pattern_list(&mut self) -> NdnResult<PatternList> {
        let mut list = PatternList::default();
        while self.pos < self.chars.len() {
            let repeat = self.parse_repeat()?;
            list.repeats.push(repeat);
        }
        Ok(list)
    }

    /// Parses one atom followed by an optional quantifier. The corrected
    /// version of `RegexPatternListMatcher::ExtractPattern`: the original
    /// source falls through from the `'('` case into the `'<'` case because
    /// it is missing `break` statements (spec.md §9); each case here handles
    /// its atom fully and returns instead of falling through.
    fn parse_repeat(&mut self) -> NdnResult<Repeat> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let group_num = self.next_group;
                self.next_group += 1;
                let inner = self.parse_until_close('(', ')')?;
                let sub_list = PatternParser { chars: inner, pos: 0, next_group: self.next_group, src: self.src }
                    .parse_pattern_list_tracking(&mut self.next_group)?;
                let quantifier = self.parse_quantifier()?;
                Ok(Repeat { atom: Atom::Group(group_num, sub_list), quantifier })
            }
            Some('<') => {
                self.pos += 1;
                let inner: String = self.parse_until_close('<', '>')?.into_iter().collect();
                let anchored = format!("^(?:{})$", inner);
                let re = Regex::new(&anchored)
                    .map_err(|e| NdnError::regex(format!("bad component regex <{}>: {}", inner, e)))?;
                let quantifier = self.parse_quantifier()?;
                Ok(Repeat { atom: Atom::Component(re), quantifier })
            }
            Some(c) => Err(NdnError::regex(format!("unexpected syntax at {:?}", c))),
            None => Err(NdnError::regex("unexpected end of pattern")),
        }
    }

    /// Consumes a balanced `left...right` span (the opening `left` already
    /// consumed) and returns its interior characters, tracking nesting depth
    /// like `RegexPatternListMatcher::ExtractSubPattern`.
    fn parse_until_close(&mut self, left: char, right: char) -> NdnResult<Vec<char>> {
        let mut depth = 1usize;
        let start = self.pos;
        while depth > 0 {
            match self.peek() {
                None => return Err(NdnError::regex("parenthesis mismatch")),
                Some(c) if c == left => {
                    depth += 1;
                    self.pos += 1;
                }
                Some(c) if c == right => {
                    depth -= 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        Ok(self.chars[start..self.pos - 1].to_vec())
    }

    fn parse_quantifier(&mut self) -> NdnResult<Quantifier> {
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                Ok(Quantifier { min: 0, max: None })
            }
            Some('+') => {
                self.pos += 1;
                Ok(Quantifier { min: 1, max: None })
            }
            Some('?') => {
                self.pos += 1;
                Ok(Quantifier { min: 0, max: Some(1) })
            }
            Some('{') => {
                self.pos += 1;
                let start = self.pos;
                while self.peek() != Some('}') {
                    if self.peek().is_none() {
                        return Err(NdnError::regex("missing right brace bracket"));
                    }
                    self.pos += 1;
                }
                let body: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1; // consume '}'
                parse_brace_quantifier(&body)
            }
            _ => Ok(Quantifier::ONE),
        }
    }

    /// Re-entrant helper so group numbers keep incrementing across nested
    /// groups even though the sub-parser owns a private character buffer.
    fn parse_pattern_list_tracking(&mut self, next_group: &mut usize) -> NdnResult<PatternList> {
        let list = self.parse_pattern_list()?;
        *next_group = self.next_group;
        Ok(list)
    }
}

fn parse_brace_quantifier(body: &str) -> NdnResult<Quantifier> {
    if let Some((lo, hi)) = body.split_once(',') {
        let min: usize = lo.parse().map_err(|_| NdnError::regex(format!("bad quantifier {{{}}}", body)))?;
        if hi.is_empty() {
            Ok(Quantifier { min, max: None })
        } else {
            let max: usize = hi.parse().map_err(|_| NdnError::regex(format!("bad quantifier {{{}}}", body)))?;
            Ok(Quantifier { min, max: Some(max) })
        }
    } else {
        let n: usize = body.parse().map_err(|_| NdnError::regex(format!("bad quantifier {{{}}}", body)))?;
        Ok(Quantifier { min: n, max: Some(n) })
    }
}

/// Attempts to match `list` against `comps[start..]`, consuming as many
/// components as a greedy match allows, recording group captures into
/// `groups_out` (indexed by group number - 1). Returns the end index on
/// success.
fn match_pattern_list(
    list: &PatternList,
    comps: &[Vec<u8>],
    start: usize,
    groups_out: &mut Vec<Option<Vec<Vec<u8>>>>,
) -> Option<usize> {
    match_repeats(&list.repeats, comps, start, groups_out)
}

fn match_repeats(
    repeats: &[Repeat],
    comps: &[Vec<u8>],
    start: usize,
    groups_out: &mut Vec<Option<Vec<Vec<u8>>>>,
) -> Option<usize> {
    if repeats.is_empty() {
        return Some(start);
    }
    let (head, rest) = repeats.split_first().unwrap();
    // Greedy: try the largest repetition count first, backtracking down to
    // the quantifier's minimum.
    let max_possible = comps.len() - start;
    let upper = head.quantifier.max.unwrap_or(max_possible).min(max_possible);
    let lower = head.quantifier.min;
    if upper < lower {
        return None;
    }
    for count in (lower..=upper).rev() {
        if let Some(captured_end) = try_match_atom_n_times(&head.atom, comps, start, count, groups_out) {
            if let Some(end) = match_repeats(rest, comps, captured_end, groups_out) {
                return Some(end);
            }
        }
    }
    None
}

fn try_match_atom_n_times(
    atom: &Atom,
    comps: &[Vec<u8>],
    start: usize,
    count: usize,
    groups_out: &mut Vec<Option<Vec<Vec<u8>>>>,
) -> Option<usize> {
    let mut pos = start;
    let mut captured: Vec<Vec<u8>> = Vec::new();
    for _ in 0..count {
        match atom {
            Atom::Component(re) => {
                if pos >= comps.len() {
                    return None;
                }
                let uri = crate::name::Name::new_single_component_uri(&comps[pos]);
                if !re.is_match(&uri) {
                    return None;
                }
                captured.push(comps[pos].clone());
                pos += 1;
            }
            Atom::Group(num, sub_list) => {
                let before = pos;
                let end = match_pattern_list(sub_list, comps, pos, groups_out)?;
                captured.extend(comps[before..end].iter().cloned());
                pos = end;
                if *num > groups_out.len() {
                    groups_out.resize(*num, None);
                }
                groups_out[*num - 1] = Some(comps[before..end].to_vec());
            }
        }
    }
    Some(pos)
}

/// A compiled Name-Regex: two matchers (anchored `primary`, prefix-tolerant
/// `secondary`) plus the expand template, mirroring `RegexTopMatcher`.
pub struct NameRegex {
    primary: PatternList,
    secondary: Option<PatternList>,
    expand_template: String,
}

impl NameRegex {
    /// Compile `expr` (with optional expand template). Without a leading
    /// `^`, an implicit `<.*>*` prefix-tolerant secondary matcher is built;
    /// without a trailing `$`, an implicit `<.*>*` suffix is appended to
    /// both matchers.
    pub fn new(expr: &str, expand: &str) -> NdnResult<Self> {
        let mut e = expr.to_string();

        if e.ends_with('$') {
            e.pop();
        } else {
            e.push_str("<.*>*");
        }

        let secondary = if e.starts_with('^') {
            e.remove(0);
            None
        } else {
            let sec_src = format!("<.*>*{}", e);
            Some(PatternParser::new(&sec_src).parse_pattern_list()?)
        };

        let primary = PatternParser::new(&e).parse_pattern_list()?;

        Ok(NameRegex { primary, secondary, expand_template: expand.to_string() })
    }

    pub fn compile(expr: &str) -> NdnResult<Self> {
        Self::new(expr, "")
    }

    /// Builds a regex that matches `name` literally: each component's URI
    /// form, regex-metacharacter-escaped, wrapped in `<...>`, preceded by
    /// `^` and optionally followed by `$`. Mirrors `RegexTopMatcher::fromName`.
    pub fn from_name(name: &Name, has_anchor: bool) -> NdnResult<Self> {
        let mut expr = String::from("^");
        for comp in name.components() {
            let uri = crate::name::Name::new_single_component_uri(comp);
            expr.push('<');
            expr.push_str(&escape_regex_metachars(&uri));
            expr.push('>');
        }
        if has_anchor {
            expr.push('$');
        }
        Self::compile(&expr)
    }

    /// Matches `name` against the compiled pattern, trying the primary
    /// (anchored) matcher first and falling back to the secondary
    /// (prefix-tolerant) matcher, recording which one succeeded so `expand`
    /// pulls back-references from the right manager.
    pub fn is_match(&self, name: &Name) -> bool {
        self.try_match(name).is_some()
    }

    fn try_match(&self, name: &Name) -> Option<(Vec<Vec<u8>>, Vec<Option<Vec<Vec<u8>>>>)> {
        let comps = name.components();

        let mut primary_groups = Vec::new();
        if let Some(end) = match_pattern_list(&self.primary, comps, 0, &mut primary_groups) {
            if end == comps.len() {
                return Some((comps.to_vec(), primary_groups));
            }
        }

        if let Some(secondary) = &self.secondary {
            let mut secondary_groups = Vec::new();
            if let Some(end) = match_pattern_list(secondary, comps, 0, &mut secondary_groups) {
                if end == comps.len() {
                    return Some((comps.to_vec(), secondary_groups));
                }
            }
        }
        None
    }

    /// Expands a template (or the compiled expand template if `template` is
    /// empty) into a concrete [`Name`]. `<literal>` appends a literal
    /// component; `\0` appends the whole match; `\k` (k >= 1) appends group
    /// `k`'s captured components.
    pub fn expand(&self, name: &Name, template: &str) -> NdnResult<Name> {
        let (whole, groups) = self.try_match(name).ok_or_else(|| NdnError::regex("no match to expand"))?;

        let tmpl = if template.is_empty() { self.expand_template.as_str() } else { template };

        let mut result = Name::new();
        let chars: Vec<char> = tmpl.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '<' => {
                    let start = i + 1;
                    let mut j = start;
                    while j < chars.len() && chars[j] != '>' {
                        j += 1;
                    }
                    if j >= chars.len() {
                        return Err(NdnError::regex("wrong format of expand string: unterminated <...>"));
                    }
                    let literal: String = chars[start..j].iter().collect();
                    result.append_str(&literal);
                    i = j + 1;
                }
                '\\' => {
                    let start = i + 1;
                    let mut j = start;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    if j == start {
                        return Err(NdnError::regex("wrong format of expand string: missing back-reference index"));
                    }
                    let idx: usize = chars[start..j].iter().collect::<String>().parse().unwrap();
                    if idx == 0 {
                        for c in &whole {
                            result.append(c.clone());
                        }
                    } else if idx <= groups.len() {
                        let group = groups[idx - 1]
                            .as_ref()
                            .ok_or_else(|| NdnError::regex(format!("back-reference \\{} did not participate in the match", idx)))?;
                        for c in group {
                            result.append(c.clone());
                        }
                    } else {
                        return Err(NdnError::regex("exceeds the range of back reference"));
                    }
                    i = j;
                }
                _ => return Err(NdnError::regex("wrong format of expand string")),
            }
        }
        Ok(result)
    }
}

fn escape_regex_metachars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '.' | '[' | ']' | '{' | '}' | '(' | ')' | '\\' | '*' | '+' | '?' | '|' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl Name {
    /// Helper for regex matching: a single component's URI text, without
    /// the leading slash `to_uri()` would add.
    fn new_single_component_uri(comp: &[u8]) -> String {
        let mut n = Name::new();
        n.append(comp.to_vec());
        n.to_uri().trim_start_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn from_name_matches_itself_anchored() {
        let name = Name::from_str("/a/b/c").unwrap();
        let re = NameRegex::from_name(&name, true).unwrap();
        assert!(re.is_match(&name));

        let prefix = Name::from_str("/a/b").unwrap();
        assert!(!re.is_match(&prefix));

        let longer = Name::from_str("/a/b/c/d").unwrap();
        assert!(!re.is_match(&longer));
    }

    #[test]
    fn capture_group_and_expand() {
        let re = NameRegex::compile("^<a><(.*)><b>$").unwrap();
        let name = Name::from_str("/a/x/b").unwrap();
        assert!(re.is_match(&name));
        let expanded = re.expand(&name, "\\1").unwrap();
        assert_eq!(expanded.to_uri(), "/x");
    }

    #[test]
    fn unanchored_matches_anywhere() {
        let re = NameRegex::compile("<b>").unwrap();
        let name = Name::from_str("/a/b/c").unwrap();
        assert!(re.is_match(&name));
    }

    #[test]
    fn star_quantifier_group() {
        let re = NameRegex::compile("^<a>(<.*>)*<z>$").unwrap();
        let name = Name::from_str("/a/x/y/z").unwrap();
        assert!(re.is_match(&name));
        let expanded = re.expand(&name, "\\1").unwrap();
        assert_eq!(expanded.to_uri(), "/x/y");
    }

    #[test]
    fn bad_template_fails() {
        let re = NameRegex::compile("^<a>$").unwrap();
        let name = Name::from_str("/a").unwrap();
        assert!(re.expand(&name, "\\9").is_err());
    }
}
