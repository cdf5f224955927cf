use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use rstest::rstest;

use super::{
    group,
    parse_lines,
    small_topology,
    Line,
};
use crate::catalog::{
    BucketMode,
    Catalog,
    INF_BUCKET,
    SIDECAR_METRICS,
};
use crate::config::Config;
use crate::driver::{
    run_pass,
    RefreshLoop,
    ScrapeRenderer,
};
use crate::simulate::Simulator;
use crate::sink::{
    RegistrySink,
    TextSink,
};
use crate::topology::Topology;

fn render_text(topology: &Topology, catalog: &Catalog, round: u64) -> (usize, String) {
    let mut sim = Simulator::at_round(round, Some(3));
    let mut sink = TextSink::new(Vec::new());
    let n = run_pass(topology, catalog, &mut sim, &mut sink).unwrap();
    (n, String::from_utf8(sink.into_inner().unwrap()).unwrap())
}

#[rstest]
fn test_single_metric_scenario(small_topology: Topology) {
    // response_total only: client_id x2 * status_code x3 inbound, status_code x3 per destination
    let catalog = Catalog::with_metrics(&SIDECAR_METRICS[..1], BucketMode::Expanded);
    let (n, text) = render_text(&small_topology, &catalog, 1);
    let lines = parse_lines(&text);

    assert_eq!(n, 9);
    assert_eq!(lines.len(), 9);
    let inbound = lines.iter().filter(|l| l.label("direction") == Some("inbound")).count();
    let outbound: Vec<_> = lines.iter().filter(|l| l.label("direction") == Some("outbound")).collect();
    assert_eq!(inbound, 6);
    assert_eq!(outbound.len(), 3);
    assert!(outbound.iter().all(|l| l.label("client_id") == Some("")));
}

#[rstest]
#[case::small(1, 1, 2, 1)]
#[case::no_fan_out(2, 3, 2, 0)]
#[case::no_fan_in(1, 2, 0, 3)]
#[case::wide(3, 2, 4, 5)]
fn test_text_cardinality(#[case] d: i64, #[case] p: i64, #[case] f: i64, #[case] o: i64) {
    let topology = Topology::build(&Config { deployments: vec![group(d, p, f, o, "ns")] });
    let (n, text) = render_text(&topology, &Catalog::new(BucketMode::Expanded), 1);
    let lines = parse_lines(&text);

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let (pods, f, o) = ((d * p) as usize, f as usize, o as usize);
    let count = |name: &str, direction: &str| {
        lines
            .iter()
            .filter(|l| l.name == name && l.label("direction") == Some(direction))
            .count()
    };

    assert_eq!(count("response_total", "inbound"), pods * f * 3);
    assert_eq!(count("response_total", "outbound"), pods * o * 3);
    assert_eq!(count("response_latency_ms_bucket", "inbound"), pods * f * 3 * 26);
    assert_eq!(count("response_latency_ms_bucket", "outbound"), pods * o * 3 * 26);
    for tcp in ["tcp_open_connections", "tcp_read_bytes_total", "tcp_write_bytes_total"] {
        assert_eq!(count(tcp, "inbound"), pods * f * 2);
        assert_eq!(count(tcp, "outbound"), pods * o * 2);
    }
    assert_eq!(n, pods * (f + o) * 87);
    assert_eq!(lines.len(), n);
}

#[rstest]
fn test_label_sets_complete_per_metric() {
    let topology = Topology::build(&Config { deployments: vec![group(2, 2, 2, 2, "ns")] });
    let catalog = Catalog::new(BucketMode::Expanded);
    let (_, text) = render_text(&topology, &catalog, 1);

    for line in parse_lines(&text) {
        let spec = catalog.specs().iter().find(|s| s.series_name == line.name).expect("unknown series");
        let expected: BTreeSet<_> = spec.label_keys.iter().copied().collect();
        assert_eq!(line.keys(), expected, "{}", line.name);
        assert_eq!(line.labels.len(), expected.len(), "duplicate keys in {}", line.name);
    }
}

#[rstest]
fn test_bucket_lines_ascending_per_group(small_topology: Topology) {
    let (_, text) = render_text(&small_topology, &Catalog::new(BucketMode::Expanded), 1);
    let buckets: Vec<Line> = parse_lines(&text)
        .into_iter()
        .filter(|l| l.name == "response_latency_ms_bucket")
        .collect();

    let mut groups: BTreeMap<(String, String, String, String), Vec<String>> = BTreeMap::new();
    for line in &buckets {
        let key = (
            line.label("direction").unwrap().to_string(),
            line.label("dst_pod").unwrap().to_string(),
            line.label("client_id").unwrap().to_string(),
            line.label("status_code").unwrap().to_string(),
        );
        groups.entry(key).or_default().push(line.label("le").unwrap().to_string());
    }

    // 2 clients * 3 codes inbound, 3 codes for the single destination
    assert_eq!(groups.len(), 9);
    for les in groups.values() {
        assert_eq!(les.len(), 26);
        assert_eq!(les.last().map(String::as_str), Some(INF_BUCKET));
        let bounds: Vec<f64> = les[..25].iter().map(|v| v.parse().unwrap()).collect();
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    }
}

#[rstest]
fn test_zero_fan_out_only_drops_outbound() {
    let with = Topology::build(&Config { deployments: vec![group(1, 2, 3, 2, "ns")] });
    let without = Topology::build(&Config { deployments: vec![group(1, 2, 3, 0, "ns")] });
    let catalog = Catalog::new(BucketMode::Expanded);

    let (_, with_text) = render_text(&with, &catalog, 1);
    let (_, without_text) = render_text(&without, &catalog, 1);
    let inbound = |text: &str| -> Vec<String> {
        parse_lines(text)
            .into_iter()
            .filter(|l| l.label("direction") == Some("inbound"))
            .map(|l| format!("{}{:?}", l.name, l.labels))
            .collect()
    };

    assert!(parse_lines(&without_text).iter().all(|l| l.label("direction") == Some("inbound")));
    assert_eq!(inbound(&with_text), inbound(&without_text));
}

#[rstest]
fn test_counters_report_round(small_topology: Topology) {
    let (_, text) = render_text(&small_topology, &Catalog::new(BucketMode::Expanded), 17);
    for line in parse_lines(&text) {
        if line.name != "tcp_open_connections" {
            assert_eq!(line.value, "17", "{}", line.name);
        }
    }
}

#[rstest]
fn test_scrapes_are_stable_and_advance(small_topology: Topology) {
    let renderer = ScrapeRenderer::new(Arc::new(small_topology), None);
    let scrape = || {
        let mut body = Vec::new();
        let stats = renderer.render(&mut body).unwrap();
        (stats, parse_lines(&String::from_utf8(body).unwrap()))
    };

    let (first_stats, first) = scrape();
    let (second_stats, second) = scrape();

    assert_eq!((first_stats.round, second_stats.round), (1, 2));
    assert_eq!(first_stats.series, second_stats.series);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.labels, b.labels);
        if a.name == "response_total" {
            assert_eq!((a.value.as_str(), b.value.as_str()), ("1", "2"));
        }
    }
}

#[rstest]
#[case::zero(0)]
#[case::later(40)]
fn test_renderer_starting_round(small_topology: Topology, #[case] first_round: u64) {
    let renderer = ScrapeRenderer::starting_at(Arc::new(small_topology), first_round, Some(1));
    let mut body = Vec::new();
    let stats = renderer.render(&mut body).unwrap();
    assert_eq!(stats.round, first_round);
    assert_eq!(stats.series, 261);

    let lines = parse_lines(&String::from_utf8(body).unwrap());
    let counter = lines.iter().find(|l| l.name == "response_total").unwrap();
    assert_eq!(counter.value, first_round.to_string());
    assert_eq!(renderer.render(std::io::sink()).unwrap().round, first_round + 1);
}

#[rstest]
fn test_registry_pass_observes_every_series_once(small_topology: Topology) {
    let catalog = Catalog::new(BucketMode::Native);
    let registry = Registry::new();
    let mut sink = RegistrySink::new(registry.clone());
    let mut sim = Simulator::new(Some(11));

    for round in 1..=2_u32 {
        let n = run_pass(&small_topology, &catalog, &mut sim, &mut sink).unwrap();
        // (fan_in + fan_out) * (3 + 3 + 2 + 2 + 2)
        assert_eq!(n, 36);

        let families = registry.gather();
        assert_eq!(families.len(), 5);
        let series: usize = families.iter().map(|f| f.get_metric().len()).sum();
        assert_eq!(series, 36);

        for family in &families {
            for metric in family.get_metric() {
                match family.get_name() {
                    "response_latency_ms" => {
                        assert_eq!(metric.get_histogram().get_sample_count(), u64::from(round));
                    },
                    "tcp_open_connections" => {
                        let v = metric.get_gauge().get_value();
                        assert!((0.0..1000.0).contains(&v));
                    },
                    _ => assert_eq!(metric.get_counter().get_value(), f64::from(round)),
                }
            }
        }
    }
}

#[tokio::test]
async fn test_refresh_loop_ticks() {
    let topology = Arc::new(Topology::build(&Config { deployments: vec![group(1, 1, 2, 1, "ns")] }));
    let refresh = RefreshLoop::new(topology, Duration::from_millis(1), Some(2));
    let registry = refresh.registry();

    let refresh = refresh.run_ticks(Some(3)).await.unwrap();

    let families = registry.gather();
    let responses = families.iter().find(|f| f.get_name() == "response_total").unwrap();
    assert_eq!(responses.get_metric().len(), 9);
    assert!(responses.get_metric().iter().all(|m| m.get_counter().get_value() == 3.0));
    assert_eq!(refresh.registry().gather().len(), 5);
}

#[rstest]
fn test_refresh_tick_is_repeatable(small_topology: Topology) {
    let mut refresh = RefreshLoop::new(Arc::new(small_topology), Duration::from_secs(1), None);
    assert_eq!(refresh.tick().unwrap(), 36);
    assert_eq!(refresh.tick().unwrap(), 36);
    let series: usize = refresh.registry().gather().iter().map(|f| f.get_metric().len()).sum();
    assert_eq!(series, 36);
}
