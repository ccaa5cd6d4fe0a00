//! End-to-end scenarios over the annotated-input surface.

use proptest as _;

use rstest::rstest;
use zdis_core::{Disassembler, OpcodeTables, Options};

fn listing(input: &str) -> zdis_core::Listing {
    let tables = OpcodeTables::load().expect("embedded tables");
    Disassembler::new(&tables, Options::default()).disassemble(input)
}

fn listing_with(input: &str, options: Options) -> zdis_core::Listing {
    let tables = OpcodeTables::load().expect("embedded tables");
    Disassembler::new(&tables, options).disassemble(input)
}

fn line_with<'a>(listing: &'a zdis_core::Listing, needle: &str) -> &'a str {
    listing
        .lines
        .iter()
        .find(|l| l.contains(needle))
        .unwrap_or_else(|| panic!("no line containing {needle:?}:\n{}", listing.lines.join("\n")))
}

#[test]
fn simple_register_load() {
    let out = listing("18CF");
    let line = line_with(&out, "LR    R12,R15");
    assert!(line.contains("Load (32)"));
    assert!(line.contains("00000000 18CF"));
    assert!(line.trim_end().ends_with("RR"));
    assert_eq!(out.summary.todo_count, 0);
    assert_eq!(out.summary.undefined_count, 0);
}

#[test]
fn two_halfwords_friendly_form() {
    let out = listing("(H)00220023");
    line_with(&out, "DC    H'34'");
    line_with(&out, "DC    H'35'");
}

#[test]
fn using_csect_and_branch() {
    let out = listing("(R12)18CF47F0C010");
    line_with(&out, "USING *,R12");
    let lr = line_with(&out, "LR    R12,R15");
    assert!(lr.starts_with("L0 "), "USING * labels the current location: {lr}");
    line_with(&out, "B     16(,R12)");
    // The branch target is materialized and reported undefined.
    line_with(&out, "L10");
    assert_eq!(out.summary.undefined_count, 1);
}

#[test]
fn dsect_inference() {
    let out = listing("(R13=>WA)5810D010 5010D044 (R13=)");
    line_with(&out, "USING WA,R13");
    line_with(&out, "L     R1,WA_10");
    line_with(&out, "ST    R1,WA_44");
    line_with(&out, "DROP  R13");
    line_with(&out, "WA       DSECT");
    line_with(&out, "DS    XL16");
    line_with(&out, "WA_10    DS    XL4");
    line_with(&out, "DS    XL48");
    line_with(&out, "WA_44    DS    XL4");
    assert_eq!(out.summary.undefined_count, 0);
}

#[test]
fn packed_decimal() {
    let out = listing("(P)19365C");
    line_with(&out, "DC    PL3'19365'");
    // The location advances by three bytes; nothing else was consumed.
    let stmt = out
        .statements
        .iter()
        .find(|s| s.operands == "PL3'19365'")
        .expect("packed statement");
    assert_eq!(stmt.hex, "19365C");
}

#[test]
fn s_type_run_collapses() {
    let out = listing("(R12,S)C000C000C000C044");
    line_with(&out, "DC    3S(*)");
    line_with(&out, "S(X'44'(R12))");
}

#[test]
fn auto_detect_mixed_text_binary() {
    let out = listing("()C1C2C300000001");
    line_with(&out, "DC    C'ABC'");
    line_with(&out, "DC    F'1'");
}

#[test]
fn empty_input_emits_prolog_and_end_only() {
    let out = listing("");
    assert!(out.lines[0].starts_with("@        START"));
    assert!(out.lines.last().unwrap().contains("END"));
    assert!(!out.lines.iter().any(|l| l.contains(" DC ")));
    line_with(&out, "R0       EQU   0");
    line_with(&out, "R15      EQU   15");
}

#[test]
fn trailing_action_emits_ds_0x() {
    let out = listing("18CF,");
    let line = line_with(&out, "DS    0X");
    assert!(line.starts_with("L2 "), "final location carries its label: {line}");
}

#[test]
fn bare_action_suppresses_auto_label() {
    let out = listing("18CF|18CF");
    assert!(
        !out.lines.iter().any(|l| l.starts_with("L2 ")),
        "| must not define a label at its location"
    );
}

#[test]
fn section_name_tag_names_the_start_statement() {
    let out = listing("(MYPROG)18CF");
    assert!(out.lines[0].starts_with("MYPROG   START"));
}

#[test]
fn nonzero_start_location() {
    let out = listing_with(
        "18CF",
        Options {
            start: 0x100,
            ..Options::default()
        },
    );
    assert!(out.lines[0].contains("START X'100'"));
    line_with(&out, "00000100 18CF");
}

#[test]
fn using_directives_are_idempotent() {
    let out = listing("(R12)(R12)18CF");
    let count = out
        .lines
        .iter()
        .filter(|l| l.contains("USING *,R12"))
        .count();
    assert_eq!(count, 1);
}

#[test]
fn independent_tags_commute() {
    let a = listing("(R12,R13=>WA)5810D010");
    let b = listing("(R13=>WA,R12)5810D010");
    for needle in ["USING *,R12", "USING WA,R13", "L     R1,WA_10"] {
        line_with(&a, needle);
        line_with(&b, needle);
    }
}

#[test]
fn observed_lengths_are_monotonic() {
    // LH observes 2 bytes at WA_10, L observes 4; the field keeps 4.
    let out = listing("(R13=>WA)4810D010 5810D010");
    line_with(&out, "WA_10    DS    XL4");
    let out = listing("(R13=>WA)5810D010 4810D010");
    line_with(&out, "WA_10    DS    XL4");
}

#[test]
fn short_data_constant_is_widened() {
    // A halfword constant at a location later addressed with a 4-byte
    // operand gets a zero-length cover constant carrying the label.
    let out = listing("(R12)/0022,5810C000");
    let cover = line_with(&out, "DC    0XL4");
    assert!(cover.starts_with("L0 "), "label moves to the cover: {cover}");
    let narrow = line_with(&out, "DC    H'34'");
    assert!(narrow.starts_with("         "), "narrow DC loses its label");
}

#[test]
fn unknown_opcode_is_marked_todo() {
    let out = listing("0000");
    let line = line_with(&out, "TODO (not code)");
    assert!(line.contains("H'0'"));
    assert_eq!(out.summary.todo_count, 1);
    line_with(&out, "TODO STATEMENT(S) NOT DECODED AS CODE");
}

#[test]
fn odd_hex_is_reported_and_skipped() {
    let out = listing("18C");
    line_with(&out, "DIS0007");
    // ceil(3/2) + 1 = 3 bytes skipped; the next slice lands at 3.
    let out = listing("18C,18CF");
    let lr = line_with(&out, "LR    R12,R15");
    assert!(lr.contains("00000003 18CF"), "{lr}");
}

#[test]
fn invalid_words_are_reported() {
    let out = listing("18CF QQQQ");
    line_with(&out, "DIS0006");
}

#[test]
fn svc_carries_service_description() {
    let out = listing("0A0D");
    let line = line_with(&out, "SVC   ");
    assert!(line.contains("ABEND"), "{line}");
}

#[test]
fn relative_branch_resolves_forward_target() {
    // BRAS R14,*+4 at 0: A7E5 0002 -> target 4.
    let out = listing("A7E5000218CF18CF");
    let line = line_with(&out, "BRAS  R14,L4");
    assert!(line.contains("00000000"));
    let labeled = line_with(&out, "00000004 18CF");
    assert!(labeled.starts_with("L4 "), "{labeled}");
    let plain = line_with(&out, "00000006 18CF");
    assert!(plain.starts_with(' '), "only the referenced location is labeled");
}

#[test]
fn org_rewinds_the_location_counter() {
    let out = listing("18CF18CF(@0)");
    line_with(&out, "ORG   @+X'0'");
}

#[test]
fn statistics_tables_are_optional() {
    let input = "18CF18CF5810C000";
    let without = listing(input);
    assert!(!without.lines.iter().any(|l| l.contains("FORMAT FREQUENCY")));
    let with = listing_with(
        input,
        Options {
            stats: true,
            ..Options::default()
        },
    );
    line_with(&with, "INSTRUCTION FORMAT FREQUENCY");
    let line = line_with(&with, "LR(2)");
    assert!(line.contains("RR"));
}

#[rstest]
#[case("18CF47F0C010", "B     16(,R12)")] // mask 15 unconditional
#[case("18CF4700C010", "NOP   16(,R12)")] // mask 0
#[case("1912478040F0", "BE    240(,R4)")] // compare then mask 8
#[case("1A12472040F0", "BP    240(,R4)")] // arith then mask 2
#[case("91805000478040F0", "BZ    240(,R4)")] // TM then mask 8
fn extended_branches_track_condition_class(#[case] hex: &str, #[case] expected: &str) {
    let out = listing(&format!("(R12){hex}"));
    line_with(&out, expected);
}

#[test]
fn branch_register_extends_too() {
    // CR R1,R2 then BCR 8,R14 -> BER R14.
    let out = listing("191207 8E");
    line_with(&out, "BER   R14");
    // BCR 15,R14 is unconditional regardless of context.
    let out = listing("07FE");
    line_with(&out, "BR    R14");
}

#[test]
fn compare_and_jump_gets_suffixed() {
    // CRJ R1,R2,8,target: EC12 0004 76 -> CRJE R1,R2,L8
    let out = listing("EC1200048076");
    line_with(&out, "CRJE  R1,R2,L8");
}

#[test]
fn load_on_condition_gets_suffixed() {
    // LOCGR R1,R2 mask 8: B9E2 81 12
    let out = listing("B9E28112");
    line_with(&out, "LOCGRE R1,R2");
}

#[test]
fn load_multiple_records_operand_span() {
    // LM R14,R12,12(R13): hint (1 + (12-14) mod 16) * 4 = 60.
    let out = listing("98ECD00C");
    let line = line_with(&out, "LM    R14,R12,12(R13)");
    assert!(line.trim_end().ends_with("60"), "{line}");
}

#[test]
fn vector_instruction_emits_vector_equates() {
    // VL V1,0(,R5): E710 5000 0006
    let out = listing("E71050000006");
    line_with(&out, "VL    V1,0(,R5)");
    line_with(&out, "V0       EQU   0");
    line_with(&out, "V31      EQU   31");
}

#[test]
fn no_vector_equates_without_vector_code() {
    let out = listing("18CF");
    assert!(!out.lines.iter().any(|l| l.contains("V31")));
}

#[test]
fn banner_and_note_blocks_attach() {
    let out = listing("(\"INITIALIZATION\")18CF('clear work area')18CF");
    line_with(&out, "* INITIALIZATION");
    line_with(&out, "* clear work area");
    assert!(out.lines.iter().any(|l| l.starts_with("*---")));
}

#[test]
fn mvc_translates_both_storage_operands() {
    // MVC 0(8,R13),16(R13) with R13 DSECT-bound.
    let out = listing("(R13=>WA)D207D000D010");
    line_with(&out, "MVC   WA_0(8),WA_10");
    line_with(&out, "WA_0     DS    XL8");
    line_with(&out, "WA_10    DS    XL8");
}

#[test]
fn predefined_label_lands_in_the_label_column() {
    let out = listing("(SAVE=2)18CF18CF");
    let line = line_with(&out, "SAVE     LR");
    assert!(line.contains("00000002 18CF"), "{line}");
}

#[test]
fn predefined_label_satisfies_references() {
    // The reference resolves to the predefined (defined) label, so the
    // undefined-labels report stays empty.
    let out = listing("(SAVE=10,R12)58F0C010");
    line_with(&out, "L     R15,16(,R12)");
    assert_eq!(out.summary.undefined_count, 0);
}
