use std::{fmt, mem};

use prost_types::FileDescriptorProto;

use crate::ErrorKind;

/// An error returned when a batch of files is rejected by a [`DescriptorPool`][crate::DescriptorPool],
/// or when a frozen [`FileBuilder`][crate::FileBuilder] is modified.
///
/// Every problem found in a batch is collected before the batch is rejected. [`Display`][fmt::Display]
/// and the accessors below describe the first problem. With the `miette` feature enabled, the
/// remaining problems are reported as related diagnostics.
#[derive(Debug)]
pub struct DescriptorError {
    problems: Box<[Problem]>,
}

/// A single problem found while validating a batch of files.
#[derive(Debug)]
pub(super) struct Problem {
    kind: ErrorKind,
    message: String,
    help: Option<String>,
    location: Option<Location>,
    source: Option<prost::DecodeError>,
}

/// The place in a `FileDescriptorProto` a problem refers to.
#[derive(Debug)]
pub(super) struct Location {
    file: String,
    path: Box<[i32]>,
    span: Option<[i32; 4]>,
}

impl DescriptorError {
    /// Turns the collected problems into an error, leaving `problems` empty. Returns `Ok` if
    /// nothing was found.
    pub(super) fn take(problems: &mut Vec<Problem>) -> Result<(), DescriptorError> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(DescriptorError {
                problems: mem::take(problems).into_boxed_slice(),
            })
        }
    }

    fn single(problem: Problem) -> Self {
        DescriptorError {
            problems: Box::new([problem]),
        }
    }

    pub(super) fn undecodable(err: prost::DecodeError) -> Self {
        DescriptorError::single(Problem {
            source: Some(err),
            ..Problem::new(ErrorKind::ParseError, "failed to decode file descriptor set")
        })
    }

    pub(super) fn frozen_builder(file: &str) -> Self {
        DescriptorError::single(
            Problem::new(
                ErrorKind::FrozenMutation,
                format!("file '{file}' has been added to a pool and can no longer be modified"),
            )
            .help("create a new FileBuilder to define more types"),
        )
    }

    /// The category of the first problem.
    pub fn kind(&self) -> ErrorKind {
        self.problems[0].kind
    }

    /// The number of problems found.
    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Always `false`, since an error holds at least one problem.
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// The name of the file the first problem was found in, if it refers to one.
    pub fn file(&self) -> Option<&str> {
        self.location().map(|l| l.file.as_str())
    }

    /// The 1-based line of the first problem, if its file carried source code info.
    pub fn line(&self) -> Option<usize> {
        let span = self.location()?.span?;
        Some(span[0] as usize + 1)
    }

    /// The source path of the first problem within its `FileDescriptorProto`.
    ///
    /// Paths have the same structure as
    /// [`Location::path`][prost_types::source_code_info::Location::path].
    pub fn path(&self) -> Option<&[i32]> {
        self.location().map(|l| &*l.path)
    }

    fn location(&self) -> Option<&Location> {
        self.problems[0].location.as_ref()
    }
}

impl std::error::Error for DescriptorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.problems[0].source()
    }
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.problems[0], f)
    }
}

#[cfg(feature = "miette")]
#[cfg_attr(docsrs, doc(cfg(feature = "miette")))]
impl miette::Diagnostic for DescriptorError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.problems[0].code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.problems[0].help()
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        if self.problems.len() < 2 {
            return None;
        }
        Some(Box::new(
            self.problems[1..]
                .iter()
                .map(|p| p as &dyn miette::Diagnostic),
        ))
    }
}

impl Problem {
    pub(super) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Problem {
            kind,
            message: message.into(),
            help: None,
            location: None,
            source: None,
        }
    }

    pub(super) fn invalid(message: impl Into<String>) -> Self {
        Problem::new(ErrorKind::InvalidField, message)
    }

    pub(super) fn unresolved(message: impl Into<String>) -> Self {
        Problem::new(ErrorKind::UnresolvedReference, message)
    }

    pub(super) fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub(super) fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl std::error::Error for Problem {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as _)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(feature = "miette")]
impl miette::Diagnostic for Problem {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }
}

impl Location {
    pub(super) fn new(file: &FileDescriptorProto, path: Box<[i32]>) -> Self {
        // Spans have three elements when the start and end lines are the same.
        let span = file
            .source_code_info
            .iter()
            .flat_map(|info| &info.location)
            .find(|loc| *loc.path == *path)
            .and_then(|loc| match loc.span[..] {
                [line, start, end] => Some([line, start, line, end]),
                [start_line, start, end_line, end] => Some([start_line, start, end_line, end]),
                _ => None,
            });

        Location {
            file: file.name().to_owned(),
            path,
            span,
        }
    }
}
