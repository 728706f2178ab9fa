//! Lexical scanning of import directives.
//!
//! Recognizes `import "<path>" [as X];` and `import <names> from "<path>";`.
//! Comments and string literals are tokenized, so an `import` appearing in
//! either is never taken for a directive.

use kiln_source::UnitId;

/// One import directive found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    /// The imported path exactly as written.
    pub path: String,
    /// 1-based line of the `import` keyword.
    pub line: u32,
    /// 1-based column of the `import` keyword.
    pub column: u32,
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Str(&'a str),
    Punct(u8),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if self.peek(0) == Some(b'\n') {
            self.line += 1;
            self.line_start = self.pos + 1;
        }
        self.pos += 1;
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(c), _) if c.is_ascii_whitespace() => self.bump(),
                (Some(b'/'), Some(b'/')) => {
                    while !matches!(self.peek(0), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.peek(0) {
                        if c == b'*' && self.peek(1) == Some(b'/') {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }
}

fn is_ident(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

impl<'a> Iterator for Lexer<'a> {
    /// A token with the line and column it starts at.
    type Item = (Token<'a>, u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();
        let src = self.src;
        let c = self.peek(0)?;
        let (line, column) = (self.line, (self.pos - self.line_start + 1) as u32);
        let start = self.pos;

        let token = if is_ident(c) {
            while self.peek(0).is_some_and(is_ident) {
                self.bump();
            }
            Token::Ident(&src[start..self.pos])
        } else if c == b'"' || c == b'\'' {
            self.bump();
            while let Some(d) = self.peek(0) {
                if d == b'\\' {
                    self.bump();
                } else if d == c || d == b'\n' {
                    break;
                }
                self.bump();
            }
            let content = &src[start + 1..self.pos.min(src.len())];
            if self.peek(0) == Some(c) {
                self.bump();
            }
            Token::Str(content)
        } else {
            // Step over a whole UTF-8 sequence so slicing stays on char boundaries.
            let width = src[start..].chars().next().map_or(1, char::len_utf8);
            for _ in 0..width {
                self.bump();
            }
            Token::Punct(c)
        };
        Some((token, line, column))
    }
}

/// Returns every import directive in `source`, in order of appearance.
///
/// A directive without a string literal before its terminating `;` is
/// ignored.
pub fn scan_imports(source: &str) -> Vec<ImportDirective> {
    let mut imports = Vec::new();
    let mut tokens = Lexer::new(source);
    while let Some((token, line, column)) = tokens.next() {
        if token != Token::Ident("import") {
            continue;
        }
        let mut path = None;
        for (token, _, _) in tokens.by_ref() {
            match token {
                Token::Punct(b';') => break,
                Token::Str(s) if path.is_none() => path = Some(s.to_string()),
                _ => {}
            }
        }
        if let Some(path) = path {
            imports.push(ImportDirective { path, line, column });
        }
    }
    imports
}

/// Resolves an imported path to a unit identifier.
///
/// Paths starting with `./` or `../` are relative to the importing unit's
/// directory; all others are relative to the project root. Returns `None`
/// for a path that climbs above the project root.
pub fn resolve_import(importer: &UnitId, path: &str) -> Option<UnitId> {
    let mut parts: Vec<&str> = Vec::new();
    if path.starts_with("./") || path.starts_with("../") {
        parts.extend(importer.as_str().split('/'));
        parts.pop();
    }
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(UnitId::new(parts.join("/")))
}
