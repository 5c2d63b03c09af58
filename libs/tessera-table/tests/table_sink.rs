use std::sync::Arc;

use tessera_api::{Item, Prefetch, Row, RowFactory, Sink, StreamOptions, Value};
use tessera_pipeline::ListSource;
use tessera_table::Table;

struct Color {
    color: &'static str,
    index: i64,
}

static COLORS: [Color; 5] = [
    Color { color: "White", index: 0 },
    Color { color: "Yellow", index: 1 },
    Color { color: "Blue", index: 2 },
    Color { color: "Red", index: 3 },
    Color { color: "Black", index: 4 },
];

fn colors_n(n: usize) -> Vec<&'static Color> {
    (0..n).flat_map(|_| COLORS.iter()).collect()
}

fn color_rows(colors: &[&Color]) -> Vec<Row> {
    let f = RowFactory::new(["Color", "Index"]);
    colors
        .iter()
        .map(|c| f.row(vec![Some(Value::from(c.color)), Some(Value::Int64(c.index))]).unwrap())
        .collect()
}

fn assert_matches(t: &Table, colors: &[&Color]) {
    assert_eq!(t.len(), colors.len());
    let color = t.col("Color").unwrap();
    let index = t.col("Index").unwrap();
    for (i, c) in colors.iter().enumerate() {
        assert_eq!(color.at(i).and_then(Value::as_str), Some(c.color), "row {i}");
        assert_eq!(index.at(i).and_then(Value::as_i64), Some(c.index), "row {i}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn table_from_list() {
    let colors = colors_n(1);
    let source = ListSource::rows(color_rows(&colors));
    let t = Table::read(Arc::new(source), StreamOptions::default()).await.unwrap();
    assert_matches(&t, &colors);
    assert_eq!(
        t.row(0).unwrap().to_string(),
        "Row{Color: string(White), Index: i64(0)}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sink_keeps_logical_order() {
    let colors = colors_n(20);
    let source = ListSource::rows(color_rows(&colors));
    let t = Table::read(Arc::new(source), StreamOptions::workers(8)).await.unwrap();
    assert_eq!(t.len(), 100);
    assert_matches(&t, &colors);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn presized_sink_with_prefetch() {
    let colors = colors_n(100);
    let sink = Table::sink(Some(colors.len()));
    let options = StreamOptions::workers(8).with_prefetch(Prefetch::Buffered(32));
    tessera_pipeline::drain(Arc::new(ListSource::rows(color_rows(&colors))), Arc::new(sink.clone()), options)
        .await
        .unwrap();
    let t = sink.into_table().unwrap();
    assert_matches(&t, &colors);
}

#[test]
fn any_delivery_permutation_yields_same_table() {
    let colors = colors_n(10);
    let rows = color_rows(&colors);
    let n = rows.len();

    // stride permutation split across threads
    let sink = Table::sink(None);
    std::thread::scope(|s| {
        for w in 0..7 {
            let sink = &sink;
            let rows = &rows;
            s.spawn(move || {
                let mut i = n - 1 - w;
                loop {
                    let j = (i * 13) % n;
                    sink.put(Item::Row(rows[j].clone()), j).unwrap();
                    if i < 7 {
                        break;
                    }
                    i -= 7;
                }
            });
        }
    });
    sink.finish(None).unwrap();
    let t = sink.into_table().unwrap();
    assert_matches(&t, &colors);
}

#[tokio::test]
async fn schema_mismatch_fails_ingestion() {
    let a = RowFactory::new(["Color", "Index"]);
    let b = RowFactory::new(["Color", "Weight"]);
    let rows = vec![
        a.row(vec![Some("Red".into()), Some(Value::Int64(1))]).unwrap(),
        b.row(vec![Some("Red".into()), Some(Value::Int64(1))]).unwrap(),
    ];
    let err = Table::read(Arc::new(ListSource::rows(rows)), StreamOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, tessera_api::Error::SchemaMismatch { .. }), "{err}");
}

#[tokio::test]
async fn lazy_reexposes_rows() {
    let colors = colors_n(3);
    let t = Table::from_rows(color_rows(&colors)).unwrap();
    let copy = Table::read(Arc::new(t.lazy()), StreamOptions::workers(4)).await.unwrap();
    assert_eq!(copy.rows(), t.rows());
}

#[test]
fn column_view() {
    let colors = colors_n(2);
    let t = Table::from_rows(color_rows(&colors)).unwrap();
    let col = t.col("Index").unwrap();
    assert_eq!(col.name(), "Index");
    assert_eq!(col.len(), 10);
    let sum: i64 = col.iter().flatten().filter_map(Value::as_i64).sum();
    assert_eq!(sum, 20);
    assert!(t.col("Missing").is_none());
    assert!(col.at(10).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sync_items_are_skipped() {
    let colors = colors_n(4);
    let mut items = Vec::new();
    for (i, row) in color_rows(&colors).into_iter().enumerate() {
        items.push(Item::Row(row));
        if i % 3 == 0 {
            items.push(Item::Sync);
        }
    }
    let t = Table::read(Arc::new(ListSource::new(items)), StreamOptions::workers(4)).await.unwrap();
    assert_eq!(t.len(), 20);
    assert_matches(&t, &colors);
}
