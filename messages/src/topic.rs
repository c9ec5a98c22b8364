use std::fmt;

/// Separator between the segments of a topic path.
pub const TOPIC_SEPARATOR: char = '/';

/// The topic every connection handler listens on.
pub const ROOT_TOPIC: &str = "root";

/// A hierarchical topic: an ordered list of segments such as
/// `root`, `root/blog-post`, `root/blog-post/saved`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    segments: Vec<String>,
}

impl Topic {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn root() -> Self {
        Self::new([ROOT_TOPIC])
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Every non-empty prefix of this topic, shortest first. Publishing once
    /// per prefix lets subscribers listen at any level of the hierarchy.
    pub fn prefixes(&self) -> Vec<Topic> {
        (1..=self.segments.len())
            .map(|len| Topic::new(self.segments[..len].iter().cloned()))
            .collect()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let separator = TOPIC_SEPARATOR.to_string();
        f.write_str(&self.segments.join(&separator))
    }
}

impl From<&str> for Topic {
    fn from(path: &str) -> Self {
        Topic::new(path.split(TOPIC_SEPARATOR))
    }
}
