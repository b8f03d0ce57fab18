use coinscript::builder::Value;
use coinscript::{
    curry_tree_hash, parse_sexpr, tree_hash, ActionMerkleTree, CompileOptions, Compiler,
    DispatchMode, Node,
};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

const WALLET: &str = r#"
    coin Wallet {
        storage address owner;

        action spend(address to, uint256 amount) {
            require(msg.sender == owner, "only the owner may spend");
            send(to, amount);
        }
    }
"#;

const SHOP: &str = r#"
    coin Shop {
        const uint256 PRICE = 100;

        action buy(address merchant, address buyer) {
            send(merchant, PRICE);
            send(buyer, 1);
        }

        action refund(address buyer, uint256 amount) {
            require(amount <= PRICE, "refund too large");
            send(buyer, amount);
        }

        action close() {
            reserveFee(1);
        }
    }
"#;

fn hash_benchmark(c: &mut Criterion) {
    let program = parse_sexpr(
        "(mod (OWNER to amount) (if (= 1 1) (list (list 51 to amount)) (x)))",
    )
    .unwrap();
    let module_hash = tree_hash(&program);
    let args: Vec<_> = (0..8u8)
        .map(|i| tree_hash(&Node::bytes(vec![i; 32])))
        .collect();

    c.bench_function("tree hash small module", |b| {
        b.iter(|| tree_hash(black_box(&program)))
    });

    c.bench_function("curry hash eight params", |b| {
        b.iter(|| curry_tree_hash(black_box(&module_hash), black_box(&args)))
    });

    c.bench_function("merkle root of 64 actions", |b| {
        b.iter(|| {
            let mut tree = ActionMerkleTree::new();
            for (i, hash) in args.iter().cycle().take(64).enumerate() {
                tree.add(format!("action{}", i), *hash).unwrap();
            }
            tree.root()
        })
    });
}

fn compile_benchmark(c: &mut Criterion) {
    let owner = Value::hex(format!("0x{}", "ab".repeat(32)));

    c.bench_function("compile wallet", |b| {
        let compiler = Compiler::new(CompileOptions::default());
        b.iter(|| {
            compiler
                .compile_with_storage(black_box(WALLET), &[("owner", owner.clone())])
                .unwrap()
        })
    });

    c.bench_function("compile shop with merkle dispatch", |b| {
        let options = CompileOptions {
            dispatch: DispatchMode::Merkle,
            ..CompileOptions::default()
        };
        let compiler = Compiler::new(options);
        b.iter(|| compiler.compile(black_box(SHOP)).unwrap())
    });
}

criterion_group!(benches, hash_benchmark, compile_benchmark);
criterion_main!(benches);
