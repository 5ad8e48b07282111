use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mdkb_core::config::SplitterConfig;
use mdkb_core::splitter::{split_by_headings, Splitter};
use mdkb_core::types::Document;

fn splitter(chunk_size: usize, chunk_overlap: usize) -> Splitter {
    Splitter::new(SplitterConfig { chunk_size, chunk_overlap, ..SplitterConfig::default() }).expect("splitter")
}

/// Text built from short words, punctuation and line breaks, no whitespace runs at the edges.
fn random_text(rng: &mut StdRng, words: usize) -> String {
    const PIECES: [&str; 10] = [" ", " ", " ", ". ", "\n", "\n\n", "。", "! ", "? ", " "];
    let mut out = String::new();
    for i in 0..words {
        let len = rng.gen_range(1..9);
        for _ in 0..len { out.push(rng.gen_range(b'a'..=b'z') as char); }
        if i + 1 < words { out.push_str(PIECES[rng.gen_range(0..PIECES.len())]); }
    }
    out
}

fn random_markdown(rng: &mut StdRng) -> String {
    let mut doc = String::from("# Title\n");
    for s in 0..rng.gen_range(1..6) {
        let words = rng.gen_range(5..120);
        doc.push_str(&random_text(rng, words));
        doc.push('\n');
        doc.push_str(&format!("{} Heading {}\n", "#".repeat(rng.gen_range(1..7)), s));
    }
    doc.push_str(&random_text(rng, 10));
    doc
}

#[test]
fn sections_reconstruct_document_lines() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let doc = random_markdown(&mut rng);
        let sections = split_by_headings(&doc);
        let rebuilt: Vec<String> = sections.join("\n").split('\n').map(str::to_string).collect();
        let original: Vec<String> = doc.split('\n').map(str::to_string).collect();
        assert_eq!(rebuilt, original);
    }
}

/// Like `random_text`, but every word character is a distinct code point, so
/// each chunk occurs exactly once in the text.
fn unique_text(rng: &mut StdRng, words: usize) -> String {
    const SEPARATORS: [&str; 7] = [" ", ". ", "\n", "\n\n", "。", "! ", "？"];
    let mut next = 0x4E00u32;
    let mut out = String::new();
    for i in 0..words {
        for _ in 0..rng.gen_range(1..6) {
            out.push(char::from_u32(next).expect("CJK code point"));
            next += 1;
        }
        if i + 1 < words { out.push_str(SEPARATORS[rng.gen_range(0..SEPARATORS.len())]); }
    }
    out
}

#[test]
fn chunks_are_bounded_and_cover_the_section() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..60 {
        let words = rng.gen_range(50..600);
        let text = unique_text(&mut rng, words);
        let chunk_size = rng.gen_range(20..400);
        let overlap = rng.gen_range(0..chunk_size);
        let chunks = splitter(chunk_size, overlap).split_section(&text);
        assert!(!chunks.is_empty());

        let mut last_pos = 0usize;
        let mut covered_to = 0usize; // byte offset up to which text is covered
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.chars().count() <= chunk_size);
            let pos = text.find(chunk.as_str()).expect("chunk is a substring");
            assert!(pos >= last_pos, "chunk {i} out of order");
            if pos > covered_to {
                assert!(text[covered_to..pos].trim().is_empty(), "gap before chunk {i} has content");
            }
            last_pos = pos;
            covered_to = covered_to.max(pos + chunk.len());
        }
        assert!(text[covered_to..].trim().is_empty(), "tail not covered");
    }
}

#[test]
fn splitting_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(3);
    let s = splitter(120, 20);
    for _ in 0..20 {
        let doc = Document { content: random_markdown(&mut rng), file_path: "/kb/x.md".into(), file_name: "x.md".into() };
        assert_eq!(s.split_document(&doc).expect("split"), s.split_document(&doc).expect("split"));
    }
}

#[test]
fn consecutive_windows_share_the_overlap() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..40 {
        // No whitespace, so trimming never alters a window.
        let text: String = (0..rng.gen_range(300..1500))
            .map(|_| if rng.gen_ratio(1, 25) { '.' } else { rng.gen_range(b'a'..=b'z') as char })
            .collect();
        let chunk_size = rng.gen_range(40..200);
        let overlap = rng.gen_range(1..chunk_size / 2);
        let chunks = splitter(chunk_size, overlap).split_section(&text);
        for pair in chunks.windows(2) {
            let a: Vec<char> = pair[0].chars().collect();
            let b: Vec<char> = pair[1].chars().collect();
            if a.len() <= overlap { continue; } // forward-forcing kicked in
            let tail = &a[a.len() - overlap..];
            let k = overlap.min(b.len());
            assert_eq!(&tail[..k], &b[..k]);
        }
    }
}

#[test]
fn chunk_index_is_contiguous_across_sections() {
    let s = splitter(30, 5);
    let content = "# A\n".to_string() + &"word ".repeat(20) + "\n# B\nshort\n\n   \n# C\n" + &"x".repeat(70);
    let doc = Document { content, file_path: "/kb/multi.md".into(), file_name: "multi.md".into() };
    let chunks = s.split_document(&doc).expect("split");
    assert!(chunks.len() > 3);
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.chunk_index, i);
        assert_eq!(c.source_file, "multi.md");
        assert!(!c.chunk_text.trim().is_empty());
    }
}

#[test]
fn undelimited_section_gives_three_windows() {
    let text = "a".repeat(1200);
    let chunks = splitter(500, 50).split_section(&text);
    // Windows [0,500), [450,950), [900,1200).
    assert_eq!(chunks.iter().map(String::len).collect::<Vec<_>>(), vec![500, 500, 300]);
}

#[test]
fn large_overlap_terminates_without_empty_chunks() {
    let text = "b".repeat(777);
    for overlap in [100, 101, 500, 10_000] {
        let chunks = splitter(100, overlap).split_section(&text);
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 100));
        assert_eq!(chunks.iter().map(String::len).sum::<usize>(), 777);
    }
}

#[test]
fn delimiter_outside_search_margin_is_ignored() {
    let s = splitter(500, 50);
    let text = format!("{}\n\n{}", "a".repeat(100), "b".repeat(700));
    let pieces = s.split_section(&text);
    assert_eq!(pieces[0].chars().count(), 500, "window keeps its full length");
    assert!(pieces[0].starts_with(&"a".repeat(100)));
    assert!(pieces[0].ends_with('b'));
    assert_eq!(pieces[1].chars().count(), 352);
}
