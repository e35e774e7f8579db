use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use bmp_chunk::{ChunkReassembler, DataChunker};
use bmp_core::{
    decrypt, derive_shared_secret, encrypt, EncryptionKeypair, Message, Recipient, SigningKeypair,
};
use bmp_ledger::{calculate_merkle_root, Block, BlockData, ZERO_HASH};
use bmp_testkit::fixtures::{mined_chain, random_payload, sample_entry, seeded_wallet};

fn bench_crypto(c: &mut Criterion) {
    let mut group = c.benchmark_group("crypto");

    group.bench_function("signing_keygen", |b| b.iter(SigningKeypair::generate));
    group.bench_function("encryption_keygen", |b| b.iter(EncryptionKeypair::generate));

    let wallet = seeded_wallet("bench", 1);
    let mut message = Message::text(
        wallet.address().clone(),
        Recipient::Direct("peer".into()),
        random_payload(1400),
    );
    message.sign(wallet.signing_keypair()).unwrap();
    let public_key = wallet.signing_public_key();

    group.throughput(Throughput::Bytes(1400));
    group.bench_function("sign_message_1400", |b| {
        b.iter(|| {
            let mut m = message.clone();
            m.sign(wallet.signing_keypair()).unwrap();
            m
        })
    });
    group.bench_function("verify_message_1400", |b| {
        b.iter(|| black_box(&message).verify(&public_key))
    });

    let alice = EncryptionKeypair::generate();
    let bob = EncryptionKeypair::generate();
    let secret = derive_shared_secret(&alice, &bob.public_key()).unwrap();
    let plaintext = random_payload(1400);
    let (nonce, ciphertext) = encrypt(&plaintext, &secret).unwrap();

    group.bench_function("encrypt_1400", |b| {
        b.iter(|| encrypt(black_box(&plaintext), &secret).unwrap())
    });
    group.bench_function("decrypt_1400", |b| {
        b.iter(|| decrypt(black_box(&ciphertext), &secret, &nonce).unwrap())
    });

    group.finish();
}

fn bench_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger");
    group.sample_size(20);

    for difficulty in [1u32, 2] {
        group.bench_with_input(
            BenchmarkId::new("mine", difficulty),
            &difficulty,
            |b, &difficulty| {
                b.iter(|| {
                    let data = BlockData::Batch {
                        messages: vec![sample_entry(1), sample_entry(2)],
                    };
                    let mut block = Block::new(1, 1_700_000_000.0, data, ZERO_HASH).unwrap();
                    block.mine(difficulty).unwrap();
                    block
                })
            },
        );
    }

    let chain = mined_chain(1, 50, 10);
    group.bench_function("validate_50_blocks", |b| b.iter(|| chain.validate()));

    let leaves: Vec<Vec<u8>> = (0..1000).map(|i| format!("leaf-{}", i).into_bytes()).collect();
    group.bench_function("merkle_1000", |b| {
        b.iter(|| calculate_merkle_root(black_box(&leaves)))
    });

    group.finish();
}

fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");

    for (len, size) in [(1024usize, 256usize), (64 * 1024, 1024), (1024 * 1024, 64 * 1024)] {
        let data = random_payload(len);
        let chunker = DataChunker::new(size).unwrap();
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(
            BenchmarkId::new("chunk", format!("{}/{}", len, size)),
            &data,
            |b, data| b.iter(|| chunker.chunk(data).unwrap().count()),
        );

        let chunks: Vec<_> = chunker.chunk(&data).unwrap().collect();
        group.bench_with_input(
            BenchmarkId::new("reassemble", format!("{}/{}", len, size)),
            &chunks,
            |b, chunks| {
                b.iter(|| {
                    let mut reassembler = ChunkReassembler::default();
                    let mut out = None;
                    for chunk in chunks.iter().rev().cloned() {
                        out = reassembler.add(chunk).unwrap().or(out);
                    }
                    out
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_crypto, bench_ledger, bench_chunking);
criterion_main!(benches);
