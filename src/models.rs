//! Playlist data model: groups of channel entries in first-seen order

use crate::error::{Error, Result};
use image::RgbaImage;
use std::io::{self, Write};

/// One playable channel
#[derive(Debug, Clone, Default)]
pub struct Entry {
    url: String,
    name: String,
    logo: String,
    /// Logo bitmap, filled in by the first successful decode
    pub(crate) decoded_logo: Option<RgbaImage>,
}

impl Entry {
    fn new(name: &str, logo: &str, url: &str) -> Result<Self> {
        Ok(Self {
            url: owned_copy(url)?,
            name: owned_copy(name)?,
            logo: owned_copy(logo)?,
            decoded_logo: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logo URL, empty when the playlist gave none
    pub fn logo(&self) -> &str {
        &self.logo
    }

    pub fn has_logo(&self) -> bool {
        !self.logo.is_empty()
    }

    pub fn decoded_logo(&self) -> Option<&RgbaImage> {
        self.decoded_logo.as_ref()
    }
}

/// A named, append-only list of entries
#[derive(Debug, Clone, Default)]
pub struct Group {
    name: String,
    entries: Vec<Entry>,
}

impl Group {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_entry(&mut self, entry: Entry) -> Result<&mut Entry> {
        self.entries
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        let index = self.entries.len();
        self.entries.push(entry);
        Ok(&mut self.entries[index])
    }
}

/// Root aggregate: every group of a parsed playlist
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    groups: Vec<Group>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive lookup; the first group with that name wins
    pub fn find_group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn find_group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// Append an empty group. On failure the playlist is left untouched.
    pub fn new_group(&mut self, name: &str) -> Result<&mut Group> {
        let group = Group {
            name: owned_copy(name)?,
            entries: Vec::new(),
        };
        self.groups
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        let index = self.groups.len();
        self.groups.push(group);
        Ok(&mut self.groups[index])
    }

    /// Find or create `group_name`, then append a channel to it.
    ///
    /// Every string is copied into the entry. On error nothing is appended,
    /// though a freshly created group may remain (empty).
    pub fn new_entry(
        &mut self,
        group_name: &str,
        name: &str,
        logo: &str,
        url: &str,
    ) -> Result<&mut Entry> {
        if url.is_empty() {
            return Err(Error::InvalidArgument("entry url is empty"));
        }

        let index = match self.group_index(group_name) {
            Some(index) => index,
            None => {
                self.new_group(group_name)?;
                self.groups.len() - 1
            }
        };

        let entry = Entry::new(name, logo, url)?;
        self.groups[index].push_entry(entry)
    }

    /// Release all groups, entries and decoded logos.
    ///
    /// Safe on an empty playlist and safe to repeat; dropping the playlist
    /// does the same.
    pub fn destroy(&mut self) {
        self.groups.clear();
        self.groups.shrink_to_fit();
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&Group> {
        self.groups.get(index)
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut Group> {
        self.groups.get_mut(index)
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_entries(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// All entries in display order, paired with their group
    pub fn entries(&self) -> impl Iterator<Item = (&Group, &Entry)> {
        self.groups
            .iter()
            .flat_map(|g| g.entries.iter().map(move |e| (g, e)))
    }

    /// Print every group followed by its channels
    pub fn write_summary<W: Write>(&self, mut out: W) -> io::Result<()> {
        for group in &self.groups {
            writeln!(out, "\n{}:", group.name)?;
            for entry in &group.entries {
                writeln!(out, "Name: {}", entry.name)?;
                writeln!(out, "Logo: {}", entry.logo)?;
                writeln!(out, "Url: {}", entry.url)?;
            }
        }
        Ok(())
    }
}

/// Copy a string, reporting allocation failure instead of aborting
fn owned_copy(s: &str) -> Result<String> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(s.len())
        .map_err(|_| Error::OutOfMemory)?;
    owned.push_str(s);
    Ok(owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_stability() {
        let mut playlist = Playlist::new();
        playlist.new_entry("g1", "a", "", "http://a").unwrap();
        playlist.new_entry("g1", "b", "", "http://b").unwrap();
        playlist.new_entry("g2", "c", "", "http://c").unwrap();
        playlist.new_entry("g1", "d", "", "http://d").unwrap();

        assert_eq!(playlist.len(), 2);
        let g1 = playlist.group(0).unwrap();
        assert_eq!(g1.name(), "g1");
        let names: Vec<&str> = g1.entries().iter().map(Entry::name).collect();
        assert_eq!(names, vec!["a", "b", "d"]);
        assert_eq!(playlist.group(1).unwrap().len(), 1);
        assert_eq!(playlist.total_entries(), 4);
    }

    #[test]
    fn test_find_or_create_idempotence() {
        let mut playlist = Playlist::new();
        let names = ["News", "Sports", "news", "Kids", "Movies"];
        for (i, name) in names.iter().enumerate() {
            playlist
                .new_entry(name, "ch", "", &format!("http://s/{}", i))
                .unwrap();
        }
        for name in names {
            playlist.new_entry(name, "again", "", "http://s/x").unwrap();
        }

        assert_eq!(playlist.len(), names.len());
        for name in names {
            let group = playlist.find_group(name).unwrap();
            assert_eq!(group.name(), name);
            assert_eq!(group.len(), 2);
        }
        assert!(playlist.find_group("NEWS").is_none());
        assert!(playlist.find_group("").is_none());
    }

    #[test]
    fn test_new_group_appends_empty() {
        let mut playlist = Playlist::new();
        playlist.new_group("Empty").unwrap();
        assert_eq!(playlist.len(), 1);
        assert!(playlist.find_group("Empty").unwrap().is_empty());
    }

    #[test]
    fn test_empty_group_name_is_a_valid_group() {
        let mut playlist = Playlist::new();
        playlist.new_entry("", "Unsorted", "", "http://u").unwrap();
        assert_eq!(playlist.find_group("").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_url_rejected_without_side_effects() {
        let mut playlist = Playlist::new();
        let err = playlist.new_entry("News", "CNN", "", "").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(playlist.is_empty());
    }

    #[test]
    fn test_entries_own_their_strings() {
        let mut playlist = Playlist::new();
        let mut buffer = String::from("Channel One");
        playlist.new_entry("G", &buffer, "logo", "http://1").unwrap();
        buffer.clear();
        buffer.push_str("overwritten");

        let entry = playlist.group(0).unwrap().entry(0).unwrap();
        assert_eq!(entry.name(), "Channel One");
        assert_eq!(entry.logo(), "logo");
        assert!(entry.has_logo());
        assert!(entry.decoded_logo().is_none());
    }

    #[test]
    fn test_duplicates_permitted() {
        let mut playlist = Playlist::new();
        playlist.new_entry("G", "Same", "", "http://same").unwrap();
        playlist.new_entry("G", "Same", "", "http://same").unwrap();
        assert_eq!(playlist.group(0).unwrap().len(), 2);
    }

    #[test]
    fn test_destroy_is_repeatable() {
        let mut playlist = Playlist::new();
        playlist.destroy();
        playlist.new_entry("G", "a", "", "http://a").unwrap();
        playlist.destroy();
        playlist.destroy();
        assert!(playlist.is_empty());
        assert_eq!(playlist.total_entries(), 0);
    }

    #[test]
    fn test_entries_iter_in_display_order() {
        let mut playlist = Playlist::new();
        playlist.new_entry("A", "1", "", "http://1").unwrap();
        playlist.new_entry("B", "2", "", "http://2").unwrap();
        playlist.new_entry("A", "3", "", "http://3").unwrap();

        let order: Vec<(&str, &str)> = playlist
            .entries()
            .map(|(g, e)| (g.name(), e.name()))
            .collect();
        assert_eq!(order, vec![("A", "1"), ("A", "3"), ("B", "2")]);
    }

    #[test]
    fn test_write_summary() {
        let mut playlist = Playlist::new();
        playlist.new_entry("News", "CNN", "http://x/l.png", "http://cnn").unwrap();

        let mut out = Vec::new();
        playlist.write_summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\nNews:\nName: CNN\nLogo: http://x/l.png\nUrl: http://cnn\n"
        );
    }
}
