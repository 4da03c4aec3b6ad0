use wrapio::{marshal, parse_option_fragments, ConfigMap, ConfigValue};

#[test]
fn fragments_become_mapping_entries() {
    let m = parse_option_fragments(&[" -b 62 ", "-F"]);
    assert_eq!(m.len(), 2);
    assert_eq!(m.get("b"), Some(&ConfigValue::Text("62".to_string())));
    assert_eq!(m.get("F"), Some(&ConfigValue::Absent));
}

#[test]
fn plus_is_a_valid_option_name() {
    let m = parse_option_fragments(&["-+ 16"]);
    assert_eq!(m.get("+"), Some(&ConfigValue::Text("16".to_string())));
}

#[test]
fn one_fragment_may_hold_several_options() {
    let m = parse_option_fragments(&["-W 0.00001 -V -1.53 -C 4"]);
    // A value stops at '-', so "-1.53" reads as a flag "V" followed by junk.
    assert_eq!(m.get("W"), Some(&ConfigValue::Text("0.00001".to_string())));
    assert_eq!(m.get("V"), Some(&ConfigValue::Absent));
    assert_eq!(m.get("C"), Some(&ConfigValue::Text("4".to_string())));
}

#[test]
fn later_occurrence_wins_but_keeps_first_position() {
    let m = parse_option_fragments(&["-a 1 -b 2", "-a 3"]);
    assert_eq!(m.keys().collect::<Vec<_>>(), ["a", "b"]);
    assert_eq!(m.get("a"), Some(&ConfigValue::Text("3".to_string())));
}

#[test]
fn parsed_fragments_round_trip_through_marshal() {
    let mut m = ConfigMap::new().with("i", "seqs.fasta");
    m.extend_from_fragments(&[" -b 62 ", "-F"]);
    let argv = marshal(&m, "tbfast", None).expect("marshal");
    assert_eq!(argv.tokens(), ["tbfast", "-i", "seqs.fasta", "-b", "62", "-F"]);
}

#[test]
fn empty_and_junk_fragments_yield_nothing() {
    let empty: [&str; 0] = [];
    assert!(parse_option_fragments(&empty).is_empty());
    assert!(parse_option_fragments(&["", "   ", "no dashes here"]).is_empty());
}
