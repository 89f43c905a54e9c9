use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use imoscout_core::{dedupe, Database, DedupedListing, EnrichedRecord, ListingStub};
use imoscout_scrapers::imovirtual::{detail_layout, listing_title};
use imoscout_scrapers::{extract_listing_stubs, extract_record, Document};
use std::time::Duration;
use tempfile::tempdir;
use tokio::runtime::Runtime;
use url::Url;

fn generate_stubs(count: usize) -> Vec<ListingStub> {
    // Every title appears twice under different links, like a reposted listing
    (0..count)
        .map(|i| {
            ListingStub::new(
                format!("Apartamento T{} #{}", i % 5, i / 2),
                Url::parse(&format!("https://www.imovirtual.com/pt/anuncio/{}", i)).unwrap(),
            )
        })
        .collect()
}

fn generate_listing_page(count: usize) -> String {
    let cards: String = (0..count)
        .map(|i| {
            format!(
                r#"<article class="offer-item"><a href="/pt/anuncio/{i}"><div><span class="offer-item-title">Moradia {i}</span></div></a><p class="price">{i} 000 €</p></article>"#
            )
        })
        .collect();
    format!("<html><body><main>{}</main></body></html>", cards)
}

fn generate_records(count: usize) -> Vec<EnrichedRecord> {
    (0..count)
        .map(|i| {
            let mut record = EnrichedRecord::from_listing(&DedupedListing {
                title: format!("Moradia {}", i),
                link: Url::parse(&format!("https://www.imovirtual.com/pt/anuncio/{}", i)).unwrap(),
            });
            record.set_address(Some("Rua X, Lisboa, Lisboa".to_string()));
            record.price = Some(format!("{} 000", 100 + i));
            record.merge_attribute("Tipo", "Moradia".to_string());
            record
        })
        .collect()
}

fn bench_dedupe(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedupe");

    for size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("stubs", size), size, |b, &size| {
            let stubs = generate_stubs(size);
            b.iter(|| black_box(dedupe(stubs.clone())));
        });
    }

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let base = Url::parse("https://www.imovirtual.com/comprar/apartamento/?page=1").unwrap();
    let selector = listing_title();

    for size in [24, 72].iter() {
        group.bench_with_input(BenchmarkId::new("listing_page", size), size, |b, &size| {
            let body = generate_listing_page(size);
            b.iter(|| {
                let document = Document::parse(base.clone(), &body);
                black_box(extract_listing_stubs(&document, &selector))
            });
        });
    }

    let detail = r#"<html><body>
        <div class="css-z9gx1y e3ustps0">Rua X, Lisboa, Lisboa</div>
        <strong class="css-t3wmkv e1l1avn10">350 000 €</strong>
        <div class="css-1h1l5lm efcnut39">2 500 €/m²</div>
        <div class="css-o4i8bk e1qm3vsd1">Tipo:</div><div class="css-1ytkscc e1qm3vsd3">Apartamento</div>
        <div class="css-o4i8bk e1qm3vsd1">Condição:</div><div class="css-1ytkscc e1qm3vsd3">Novo</div>
    </body></html>"#;
    let layout = detail_layout();
    let listing = DedupedListing {
        title: "T2".to_string(),
        link: Url::parse("https://www.imovirtual.com/pt/anuncio/t2").unwrap(),
    };
    group.bench_function("detail_page", |b| {
        b.iter(|| {
            let document = Document::parse(listing.link.clone(), detail);
            black_box(extract_record(&document, &layout, &listing))
        });
    });

    group.finish();
}

fn bench_database_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("database");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for size in [10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("save_records", size), size, |b, &size| {
            let records = generate_records(size);
            b.to_async(&rt).iter(|| async {
                let dir = tempdir().unwrap();
                let db = Database::new(dir.path().join("bench.db")).await.unwrap();
                black_box(db.save_records("imovirtual", "moradia", &records).await.unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dedupe, bench_extraction, bench_database_operations);

criterion_main!(benches);
