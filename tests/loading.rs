use ironload::testing::*;
use ironload::*;

#[test]
fn quoted_fields_round_trip() -> anyhow::Result<()> {
    let notes = [
        "plain",
        "has,comma",
        "say \"hi\"",
        "two\nlines",
        "back\\slash",
        "",
    ];
    let text = DelimitedBuilder::new()
        .rows(notes.len(), |i| [i.to_string(), notes[i].to_string()])
        .build();

    let mut ids = ColumnBuffer::<u32>::new();
    let mut out = ColumnBuffer::<Option<String>>::new();
    let mut columns = vec![
        ColumnDescriptor::new("id", FromStrParser::<u32>::new("int"), &mut ids),
        ColumnDescriptor::new("note", TextParser, &mut out),
    ];
    let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes(text))?;
    drop(columns);

    assert_eq!(rows, notes.len() as u64);
    assert_column_eq(&ids, &[0, 1, 2, 3, 4, 5]);
    let expected: Vec<Option<String>> = notes.iter().map(|n| Some(n.to_string())).collect();
    assert_column_eq(&out, &expected);
    assert!(!out.has_nulls());
    Ok(())
}

#[test]
fn null_marker_sets_nulls_and_flag() -> anyhow::Result<()> {
    let mut qty = ColumnBuffer::<i32>::new();
    let mut name = ColumnBuffer::<Option<String>>::new();
    let mut columns = vec![
        ColumnDescriptor::new("qty", FromStrParser::<i32>::new("int"), &mut qty).with_null_marker("NULL"),
        ColumnDescriptor::new("name", TextParser, &mut name).with_null_marker("NULL"),
    ];
    let input = "1,null\nNULL,\"NULL\"\n3,x\n";
    let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes(input))?;
    drop(columns);

    assert_eq!(rows, 3);
    assert_column_eq(&qty, &[1, i32::MIN, 3]);
    assert!(qty.is_null(1));
    assert!(qty.has_nulls());
    // A quoted marker is a value, not a null.
    assert_column_eq(&name, &[None, Some("NULL".into()), Some("x".into())]);
    assert!(name.has_nulls());
    Ok(())
}

#[test]
fn no_nulls_leaves_flag_clear() -> anyhow::Result<()> {
    let mut n = ColumnBuffer::<u64>::new();
    let mut columns = vec![ColumnDescriptor::new("n", FromStrParser::<u64>::new("bigint"), &mut n).with_null_marker("\\N")];
    Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes(numbered_rows(50, 1)))?;
    drop(columns);

    assert_eq!(n.len(), 50);
    assert!(!n.has_nulls());
    Ok(())
}

#[test]
fn skip_then_cap_rows() -> anyhow::Result<()> {
    let mut n = ColumnBuffer::<u32>::new();
    let mut columns = vec![ColumnDescriptor::new("n", FromStrParser::<u32>::new("int"), &mut n)];
    let opts = LoadOptions::default().with_skip_rows(2).with_max_rows(Some(3));
    let rows = Loader::new(opts).run(&mut columns, &mut ReadCursor::from_bytes(numbered_rows(10, 1)))?;
    drop(columns);

    assert_eq!(rows, 3);
    assert_column_eq(&n, &[2, 3, 4]);
    Ok(())
}

#[test]
fn skipped_rows_honor_quotes() -> anyhow::Result<()> {
    let mut head = ColumnBuffer::<Option<String>>::new();
    let mut columns = vec![ColumnDescriptor::new("head", TextParser, &mut head)];
    let input = "\"header\nspans two lines\"\nvalue\n";
    let rows = Loader::new(LoadOptions::default().with_skip_rows(1))
        .run(&mut columns, &mut ReadCursor::from_bytes(input))?;
    drop(columns);

    assert_eq!(rows, 1);
    assert_column_eq(&head, &[Some("value".into())]);
    Ok(())
}

#[test]
fn multi_byte_separators() -> anyhow::Result<()> {
    let mut a = ColumnBuffer::<i64>::new();
    let mut b = ColumnBuffer::<Option<String>>::new();
    let mut columns = vec![
        ColumnDescriptor::new("a", FromStrParser::<i64>::new("bigint"), &mut a),
        ColumnDescriptor::new("b", TextParser, &mut b),
    ];
    let opts = LoadOptions::default()
        .with_column_separator("||")
        .with_record_separator("\r\n");
    let input = "1||one|half\r\n-2||\"q||q\"\r\n";
    let rows = Loader::new(opts).run(&mut columns, &mut starved_cursor(input, 3))?;
    drop(columns);

    assert_eq!(rows, 2);
    assert_column_eq(&a, &[1, -2]);
    assert_column_eq(&b, &[Some("one|half".into()), Some("q||q".into())]);
    Ok(())
}

#[test]
fn per_column_separator_and_quote() -> anyhow::Result<()> {
    let mut key = ColumnBuffer::<Option<String>>::new();
    let mut val = ColumnBuffer::<Option<String>>::new();
    let mut columns = vec![
        ColumnDescriptor::new("key", TextParser, &mut key)
            .with_separator("=")
            .with_quote('\''),
        ColumnDescriptor::new("val", TextParser, &mut val),
    ];
    let input = "'a=b'=x,y\nc=\"z\"\n";
    let opts = LoadOptions::default().with_column_separator(";");
    let rows = Loader::new(opts).run(&mut columns, &mut ReadCursor::from_bytes(input))?;
    drop(columns);

    assert_eq!(rows, 2);
    assert_column_eq(&key, &[Some("a=b".into()), Some("c".into())]);
    assert_column_eq(&val, &[Some("x,y".into()), Some("z".into())]);
    Ok(())
}

#[test]
fn column_quote_may_enclose_the_load_quote() -> anyhow::Result<()> {
    let mut title = ColumnBuffer::<Option<String>>::new();
    let mut n = ColumnBuffer::<u32>::new();
    let mut columns = vec![
        ColumnDescriptor::new("title", TextParser, &mut title).with_quote('\''),
        ColumnDescriptor::new("n", FromStrParser::<u32>::new("int"), &mut n),
    ];
    let input = "'5\" tv',1\n'7\" tv',2\n";
    let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes(input))?;
    drop(columns);

    assert_eq!(rows, 2);
    assert_column_eq(&title, &[Some("5\" tv".into()), Some("7\" tv".into())]);
    assert_column_eq(&n, &[1, 2]);
    Ok(())
}

#[test]
fn quoting_disabled_keeps_quote_bytes() -> anyhow::Result<()> {
    let mut s = ColumnBuffer::<Option<String>>::new();
    let mut columns = vec![ColumnDescriptor::new("s", TextParser, &mut s)];
    let opts = LoadOptions::default().with_quote(None);
    Loader::new(opts).run(&mut columns, &mut ReadCursor::from_bytes("\"a\n"))?;
    drop(columns);

    assert_column_eq(&s, &[Some("\"a".into())]);
    Ok(())
}

#[test]
fn last_record_without_separator() -> anyhow::Result<()> {
    let mut n = ColumnBuffer::<u8>::new();
    let mut b = ColumnBuffer::<Option<bool>>::new();
    let mut columns = vec![
        ColumnDescriptor::new("n", FromStrParser::<u8>::new("tinyint"), &mut n),
        ColumnDescriptor::new("b", BoolParser, &mut b),
    ];
    let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes("1,yes\n2,F"))?;
    drop(columns);

    assert_eq!(rows, 2);
    assert_column_eq(&b, &[Some(true), Some(false)]);
    Ok(())
}

#[test]
fn custom_parser_fn() -> anyhow::Result<()> {
    let hex = parser_fn("hex", |s: &str| u32::from_str_radix(s.trim_start_matches("0x"), 16).ok());
    let mut v = ColumnBuffer::<u32>::new();
    let mut columns = vec![ColumnDescriptor::new("v", hex, &mut v)];
    Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes("0xff\n10\n"))?;
    drop(columns);

    assert_column_eq(&v, &[255, 16]);
    Ok(())
}

#[test]
fn sample_orders_fixture() -> anyhow::Result<()> {
    let mut id = ColumnBuffer::<u32>::new();
    let mut customer = ColumnBuffer::<Option<String>>::new();
    let mut amount = ColumnBuffer::<f64>::new();
    let mut note = ColumnBuffer::<Option<String>>::new();
    let mut columns = vec![
        ColumnDescriptor::new("id", FromStrParser::<u32>::new("int"), &mut id),
        ColumnDescriptor::new("customer", TextParser, &mut customer),
        ColumnDescriptor::new("amount", FromStrParser::<f64>::new("double"), &mut amount).with_null_marker("\\N"),
        ColumnDescriptor::new("note", TextParser, &mut note),
    ];
    let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes(sample_orders()))?;
    drop(columns);

    assert_eq!(rows, 4);
    assert_column_eq(&id, &[1, 2, 3, 4]);
    assert!(amount.get(2).is_some_and(|v| v.is_nan()));
    assert!(amount.has_nulls());
    assert_column_eq(
        &note,
        &[
            Some("first order".into()),
            Some("gift, wrapped".into()),
            Some("two\nlines".into()),
            Some("he said \"now\"".into()),
        ],
    );
    Ok(())
}

#[test]
fn classic_entry_point() -> anyhow::Result<()> {
    let mut n = ColumnBuffer::<i32>::new();
    let mut columns = vec![ColumnDescriptor::new("n", FromStrParser::<i32>::new("int"), &mut n)];
    let input = "'a\n1\n2\n3\n";
    let rows = load(&mut columns, &mut ReadCursor::from_bytes(input), None, ",", "\n", '\0', 1, -1)?;
    drop(columns);

    assert_eq!(rows, 3);
    assert_column_eq(&n, &[1, 2, 3]);
    Ok(())
}

#[test]
fn classic_entry_point_caps_rows() -> anyhow::Result<()> {
    let mut n = ColumnBuffer::<i32>::new();
    let mut columns = vec![ColumnDescriptor::new("n", FromStrParser::<i32>::new("int"), &mut n)];
    let rows = load(
        &mut columns,
        &mut ReadCursor::from_bytes(numbered_rows(20, 1)),
        None,
        ",",
        "\n",
        '"',
        -1,
        4,
    )?;
    drop(columns);

    assert_eq!(rows, 4);
    assert_column_eq(&n, &[0, 1, 2, 3]);
    Ok(())
}

#[test]
fn echo_prompts_before_refills() -> anyhow::Result<()> {
    let mut echo: Vec<u8> = Vec::new();
    let mut n = ColumnBuffer::<u32>::new();
    let mut columns = vec![ColumnDescriptor::new("n", FromStrParser::<u32>::new("int"), &mut n)];
    let rows = Loader::new(LoadOptions::default())
        .echo(&mut echo)
        .run(&mut columns, &mut starved_cursor(numbered_rows(5, 1), 4))?;
    drop(columns);

    assert_eq!(rows, 5);
    assert!(echo.len() >= ECHO_PROMPT.len());
    assert_eq!(echo.len() % ECHO_PROMPT.len(), 0);
    assert!(echo.chunks(ECHO_PROMPT.len()).all(|c| c == ECHO_PROMPT));
    Ok(())
}

#[test]
fn empty_input_loads_nothing() -> anyhow::Result<()> {
    let mut n = ColumnBuffer::<u32>::new();
    let mut columns = vec![ColumnDescriptor::new("n", FromStrParser::<u32>::new("int"), &mut n)];
    let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut ReadCursor::from_bytes(""))?;
    drop(columns);

    assert_eq!(rows, 0);
    assert!(n.is_empty());
    Ok(())
}

#[test]
fn no_columns_is_a_config_error() {
    let mut columns: Vec<ColumnDescriptor<'_>> = Vec::new();
    let err = Loader::new(LoadOptions::default())
        .run(&mut columns, &mut ReadCursor::from_bytes("1\n"))
        .unwrap_err();
    assert!(matches!(err, LoadError::Config(_)));
}
