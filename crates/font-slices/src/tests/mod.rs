use std::{
    collections::BTreeSet,
    fs,
    path::PathBuf,
    sync::Mutex,
};

use test_casing::test_casing;

use crate::{
    compact, dispatch, font_face_rule, parse_codepoint, parse_definition, unicode_range,
    CodepointSet, DispatchOptions, DispatchReport, FontFace, ParseErrorKind, Slice, SubsetError,
    SubsetJob, Subsetter, PROVENANCE_COMMENT,
};

const VALID_TOKENS: [(&str, u32); 10] = [
    ("U+4E00", 0x4E00),
    ("u+4e00", 0x4E00),
    ("U+10FFFF", 0x0010_FFFF),
    ("0x21", 0x21),
    ("0X21", 0x21),
    ("20013", 20013),
    ("10", 10),
    ("1a", 0x1A),
    ("cafe", 0xCAFE),
    ("  65  ", 65),
];

#[test_casing(10, VALID_TOKENS)]
fn parsing_codepoint_tokens(token: &str, expected: u32) {
    assert_eq!(parse_codepoint(token).unwrap(), expected);
}

const INVALID_TOKENS: [&str; 7] = ["", "   ", "12x34", "0x", "U+", "U+ 21", "zzz"];

#[test_casing(7, INVALID_TOKENS)]
fn parsing_invalid_codepoint_tokens(token: &str) {
    let err = parse_codepoint(token).unwrap_err();
    assert!(
        matches!(
            err.kind(),
            ParseErrorKind::InvalidToken { .. } | ParseErrorKind::EmptyToken
        ),
        "{err}"
    );
}

#[test]
fn parsing_out_of_range_codepoint() {
    let err = parse_codepoint("0x110000").unwrap_err();
    assert_matches_out_of_range(&err, 0x11_0000);
    let err = parse_codepoint("U+FFFFFF").unwrap_err();
    assert_matches_out_of_range(&err, 0x00FF_FFFF);
}

fn assert_matches_out_of_range(err: &crate::ParseError, expected: u32) {
    match err.kind() {
        ParseErrorKind::CodepointOutOfRange { value } => assert_eq!(*value, expected),
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[test]
fn codepoint_parsing_is_idempotent_under_canonical_rendering() {
    for (token, _) in VALID_TOKENS {
        let parsed = parse_codepoint(token).unwrap();
        let rendered = format!("U+{parsed:04X}");
        assert_eq!(parse_codepoint(&rendered).unwrap(), parsed, "{token}");
    }
}

#[test]
fn parsing_definition_block_with_range() {
    let definition = "
        subsets {
          codepoints: 0x4E00-0x4E10
        }";
    let slices = parse_definition(definition).unwrap();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].ordinal, 1);
    assert_eq!(slices[0].codepoints.len(), 17);

    let ranges = compact(&slices[0].codepoints);
    assert_eq!(ranges, [0x4E00..=0x4E10]);
    assert_eq!(unicode_range(&ranges), "U+4E00-4E10");
}

#[test]
fn parsing_mixed_format_tokens() {
    let definition = "
        subsets {
          codepoints: 20013, U+6587, 0x21
        }";
    let slices = parse_definition(definition).unwrap();
    assert_eq!(slices.len(), 1);
    let expected: CodepointSet = [20013, 0x6587, 0x21].into_iter().collect();
    assert_eq!(slices[0].codepoints, expected);
}

#[test]
fn parsing_dotted_ranges_and_dashes() {
    // `..` ranges, en/em dashes and `;` separators all come up in the wild.
    let definition = "
        subsets {
          codepoints: 0x41..0x43; 48\u{2013}50
        }";
    let slices = parse_definition(definition).unwrap();
    let expected: CodepointSet = [0x41, 0x42, 0x43, 48, 49, 50].into_iter().collect();
    assert_eq!(slices[0].codepoints, expected);
}

#[test]
fn parsing_inverted_range_bounds() {
    let definition = "subsets {\n codepoints: 0x4E10-0x4E00\n}";
    let slices = parse_definition(definition).unwrap();
    assert_eq!(slices[0].codepoints.len(), 17);
    assert_eq!(compact(&slices[0].codepoints), [0x4E00..=0x4E10]);
}

#[test]
fn parsing_skips_comments_blanks_and_foreign_blocks() {
    let definition = "
        # slice definitions
        language {
          id: \"zh-Hans\"
        }
        subsets {
          name: \"base\"
          codepoints: 65 # latin A
        }
        stray: line
        ";
    let slices = parse_definition(definition).unwrap();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].codepoints, CodepointSet::from([65]));
}

#[test]
fn parsing_discards_empty_blocks() {
    let definition = "
        subsets {
        }
        subsets {
          codepoints: 65
        }
        subsets {
        }";
    let slices = parse_definition(definition).unwrap();
    assert_eq!(slices.len(), 1);
    // Ordinals number the filtered list, not raw block positions.
    assert_eq!(slices[0].ordinal, 1);
}

#[test]
fn parsing_block_start_replaces_empty_open_block() {
    let definition = "
        subsets {
        subsets {
          codepoints: 65
        }";
    let slices = parse_definition(definition).unwrap();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].codepoints, CodepointSet::from([65]));
}

#[test]
fn parsing_flushes_unterminated_final_block() {
    let definition = "subsets {\n codepoints: 65, 66";
    let slices = parse_definition(definition).unwrap();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].codepoints, CodepointSet::from([65, 66]));
}

#[test]
fn parse_failure_returns_no_partial_slices() {
    let definition = "
        subsets {
          codepoints: 65-90
        }
        subsets {
          codepoints: 12x34
        }";
    let err = parse_definition(definition).unwrap_err();
    assert_eq!(err.line(), Some(6));
    match err.kind() {
        ParseErrorKind::InvalidToken { token } => assert_eq!(token, "12x34"),
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[test]
fn compacting_codepoint_sets() {
    assert!(compact(&CodepointSet::new()).is_empty());
    assert_eq!(compact(&CodepointSet::from([7])), [7..=7]);

    let set: CodepointSet = [1, 2, 3, 5, 6, 10].into_iter().collect();
    assert_eq!(compact(&set), [1..=3, 5..=6, 10..=10]);
}

#[test]
fn compaction_is_minimal_and_lossless() {
    let set: CodepointSet = (0x20..=0x7E)
        .chain(0x4E00..=0x4E10)
        .chain([0x3000, 0x3002, 0x3003])
        .collect();
    let ranges = compact(&set);

    let reconstructed: CodepointSet = ranges.iter().cloned().flatten().collect();
    assert_eq!(reconstructed, set);
    for window in ranges.windows(2) {
        let [prev, next] = window else { unreachable!() };
        assert!(*next.start() > *prev.end() + 1, "{prev:?} / {next:?}");
    }
}

#[test]
fn rendering_unicode_ranges() {
    assert_eq!(unicode_range(&[]), "");
    assert_eq!(unicode_range(&[0x21..=0x21]), "U+0021");
    assert_eq!(unicode_range(&[0xA0..=0xA0]), "U+00A0");
    assert_eq!(unicode_range(&[0x4E00..=0x4E10]), "U+4E00-4E10");
    assert_eq!(unicode_range(&[0x10_FFFF..=0x10_FFFF]), "U+10FFFF");
    assert_eq!(
        unicode_range(&[0x21..=0x23, 0x4E00..=0x4E10]),
        "U+0021-0023, U+4E00-4E10"
    );
}

#[test]
fn rendering_font_face_rule() {
    let face = FontFace {
        family: "Test Sans".to_owned(),
        style: "normal".to_owned(),
        weight: "400".to_owned(),
    };
    let rule = font_face_rule(&face, "TestSans-slice002.woff2", "woff2", "U+4E00-4E10");
    assert_eq!(
        rule,
        "@font-face{font-family:'Test Sans';font-style:normal;font-weight:400;\
         src:url('TestSans-slice002.woff2') format('woff2');font-display:swap;\
         unicode-range:U+4E00-4E10;}"
    );
}

#[derive(Debug, Clone)]
struct RecordedJob {
    ordinal: usize,
    unicode_range: String,
    file_name: String,
}

/// Test double standing in for the external subsetting process.
#[derive(Debug, Default)]
struct RecordingSubsetter {
    calls: Mutex<Vec<RecordedJob>>,
    fail_ordinals: BTreeSet<usize>,
    artifact_dir: Option<PathBuf>,
}

impl RecordingSubsetter {
    fn recorded(&self) -> Vec<RecordedJob> {
        self.calls.lock().unwrap().clone()
    }
}

impl Subsetter for RecordingSubsetter {
    fn subset(&self, job: &SubsetJob<'_>) -> Result<(), SubsetError> {
        self.calls.lock().unwrap().push(RecordedJob {
            ordinal: job.ordinal,
            unicode_range: job.unicode_range.to_owned(),
            file_name: job.file_name.to_owned(),
        });
        if let Some(dir) = &self.artifact_dir {
            fs::write(dir.join(job.file_name), job.unicode_range)?;
        }
        if self.fail_ordinals.contains(&job.ordinal) {
            return Err(format!("synthetic failure for slice {}", job.ordinal).into());
        }
        Ok(())
    }
}

fn test_options(jobs: usize) -> DispatchOptions {
    DispatchOptions {
        face: FontFace {
            family: "Test Sans".to_owned(),
            style: "normal".to_owned(),
            weight: "400".to_owned(),
        },
        file_stem: "TestSans".to_owned(),
        container: "woff2".to_owned(),
        jobs,
    }
}

fn slice(ordinal: usize, codepoints: impl IntoIterator<Item = u32>) -> Slice {
    Slice {
        ordinal,
        codepoints: codepoints.into_iter().collect(),
    }
}

fn successful_dispatch(
    slices: &[Slice],
    coverage: &CodepointSet,
    subsetter: &RecordingSubsetter,
    jobs: usize,
) -> DispatchReport {
    let report = dispatch(slices, coverage, subsetter, &test_options(jobs)).unwrap();
    assert!(report.failures.is_empty());
    report
}

#[test]
fn dispatching_skips_slices_without_coverage_overlap() {
    let slices = [
        slice(1, [0x1F600, 0x1F601]), // emoji, absent from the font
        slice(2, 0x4E00..=0x4E10),
    ];
    let coverage: CodepointSet = (0x4E00..=0x9FA5).collect();
    let subsetter = RecordingSubsetter::default();

    let report = successful_dispatch(&slices, &coverage, &subsetter, 4);
    assert_eq!(report.total(), 2);
    assert_eq!(report.emitted(), 1);
    assert_eq!(report.skipped(), 1);

    let recorded = subsetter.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].ordinal, 2);
    assert_eq!(recorded[0].file_name, "TestSans-slice002.woff2");
    assert_eq!(recorded[0].unicode_range, "U+4E00-4E10");

    // The emitted rule must reference the second block's ordinal, not 1.
    let stylesheet = report.stylesheet();
    assert!(stylesheet.contains("TestSans-slice002.woff2"), "{stylesheet}");
    assert!(!stylesheet.contains("slice001"), "{stylesheet}");
}

#[test]
fn dispatching_with_empty_coverage_skips_everything() {
    let slices = [slice(1, [0x21]), slice(2, [0x22]), slice(3, [0x23])];
    let coverage = CodepointSet::new();
    let subsetter = RecordingSubsetter::default();

    let report = successful_dispatch(&slices, &coverage, &subsetter, 2);
    assert_eq!(report.skipped(), slices.len());
    assert_eq!(report.emitted(), 0);
    assert!(subsetter.recorded().is_empty());
    assert_eq!(report.stylesheet(), format!("{PROVENANCE_COMMENT}\n"));
}

#[test]
fn dispatching_intersects_each_slice_with_coverage() {
    let slices = [slice(1, 0x20..=0x7E)];
    // Only a few codepoints of the slice are covered; the unicode-range
    // handed to the subsetter must shrink accordingly.
    let coverage: CodepointSet = [0x41, 0x42, 0x43, 0x60].into_iter().collect();
    let subsetter = RecordingSubsetter::default();

    successful_dispatch(&slices, &coverage, &subsetter, 1);
    let recorded = subsetter.recorded();
    assert_eq!(recorded[0].unicode_range, "U+0041-0043, U+0060");
}

#[test]
fn failed_unit_is_recorded_without_cancelling_siblings() {
    let slices = [slice(1, [0x21]), slice(2, [0x22]), slice(3, [0x23])];
    let coverage: CodepointSet = (0x20..=0x7E).collect();
    let subsetter = RecordingSubsetter {
        fail_ordinals: BTreeSet::from([2]),
        ..RecordingSubsetter::default()
    };

    let report = dispatch(&slices, &coverage, &subsetter, &test_options(3)).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].ordinal, 2);
    assert!(
        report.failures[0].error.to_string().contains("slice 2"),
        "{}",
        report.failures[0].error
    );

    // Siblings still ran to completion and produced their fragments.
    assert_eq!(subsetter.recorded().len(), 3);
    let emitted_ordinals: Vec<_> = report
        .results
        .iter()
        .filter(|result| result.fragment.is_some())
        .map(|result| result.ordinal)
        .collect();
    assert_eq!(emitted_ordinals, [1, 3]);
}

#[test]
fn artifact_names_are_deterministic_across_reruns() {
    let slices = [slice(7, [0x21]), slice(123, [0x22])];
    let coverage: CodepointSet = (0x20..=0x7E).collect();
    let dir = tempfile::tempdir().unwrap();
    let subsetter = RecordingSubsetter {
        artifact_dir: Some(dir.path().to_owned()),
        ..RecordingSubsetter::default()
    };

    for _ in 0..2 {
        successful_dispatch(&slices, &coverage, &subsetter, 2);
    }

    let mut names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort_unstable();
    // Reruns overwrite, so two passes leave exactly the two padded names.
    assert_eq!(names, ["TestSans-slice007.woff2", "TestSans-slice123.woff2"]);
}

const WORKER_COUNTS: [usize; 4] = [1, 2, 8, 16];

#[test_casing(4, WORKER_COUNTS)]
fn manifest_is_identical_across_worker_counts(jobs: usize) {
    let slices: Vec<_> = (1..=25)
        .map(|ordinal| {
            let start = 0x4E00 + (ordinal as u32) * 0x10;
            slice(ordinal, start..start + 8)
        })
        .collect();
    let coverage: CodepointSet = (0x4E00..=0x9FA5).collect();

    let baseline =
        successful_dispatch(&slices, &coverage, &RecordingSubsetter::default(), 1).stylesheet();
    let parallel =
        successful_dispatch(&slices, &coverage, &RecordingSubsetter::default(), jobs).stylesheet();
    assert_eq!(parallel, baseline);

    // Source order survives parallel execution: rules appear by ordinal.
    let positions: Vec<_> = (1..=25)
        .map(|ordinal| baseline.find(&format!("slice{ordinal:03}")).unwrap())
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

#[test]
fn stylesheet_starts_with_provenance_comment() {
    let slices = [slice(1, [0x21])];
    let coverage: CodepointSet = (0x20..=0x7E).collect();
    let report = successful_dispatch(&slices, &coverage, &RecordingSubsetter::default(), 1);

    let stylesheet = report.stylesheet();
    let (first_line, rest) = stylesheet.split_once('\n').unwrap();
    assert_eq!(first_line, PROVENANCE_COMMENT);
    assert!(rest.starts_with("@font-face{"), "{rest}");
}

#[test]
fn readme_is_in_sync() {
    version_sync::assert_markdown_deps_updated!("README.md");
}

#[test]
fn html_root_url_is_in_sync() {
    version_sync::assert_html_root_url_updated!("src/lib.rs");
}
