//! Compilation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fusec::{compile_source, Compiler};

const SIMPLE: &str = "\
<script>count = wrap(0)</script>
<template><p>{{count}}</p><button onclick=\"count++\">+</button></template>
<style isolated>.p { color: red; }</style>
";

const COMPLEX: &str = "\
<script>
count = wrap(0)
items = wrap(['a', 'b', 'c'])
user = wrap({ name: 'Ada', role: 'admin' })
total = computed(() => count() * 2)
grand = computed(() => total() + 1)
mount(() => { count(1); })
update((name) => console.log(name))
function reset() { count = 0; items = []; }
</script>
<template>
<h1>{{user.name}}</h1>
<p>{{count}} / {{total}} / {{grand}}</p>
<div if=\"count() > 3\">big</div>
<div else>small</div>
<ul><li each=\"item, i in items\">{{i}}: {{item}}</li></ul>
<button onclick=\"count++\">+</button>
<button onclick=\"items.push('x')\">add</button>
</template>
<style>
:root { --accent: #ff0044; }
.card { color: var(--accent); }
@media (max-width: 600px) { .card { display: none; } }
</style>
";

fn bench_simple_compilation(c: &mut Criterion) {
    c.bench_function("simple_compilation", |b| {
        b.iter(|| compile_source(black_box(SIMPLE), black_box("Simple.fuse")).unwrap())
    });
}

fn bench_complex_compilation(c: &mut Criterion) {
    c.bench_function("complex_compilation", |b| {
        b.iter(|| compile_source(black_box(COMPLEX), black_box("Complex.fuse")).unwrap())
    });
}

fn bench_warm_session(c: &mut Criterion) {
    // Repeated compiles through one compiler hit the session caches.
    c.bench_function("warm_session_compilation", |b| {
        let mut compiler = Compiler::new();
        b.iter(|| {
            compiler
                .compile_source(black_box(COMPLEX), black_box("Complex.fuse"))
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_simple_compilation,
    bench_complex_compilation,
    bench_warm_session
);
criterion_main!(benches);
