use strata_crypto::{AddressKey, ChunkEncryptor, KeyEncryptionKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn encryptor() -> ChunkEncryptor {
    ChunkEncryptor::new(
        KeyEncryptionKey::from_bytes([0xABu8; 32]),
        &AddressKey::from_bytes([0xCDu8; 32]),
    )
    .unwrap()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_chunk(bencher: divan::Bencher, size: usize) {
    let enc = encryptor();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| enc.encrypt_content(divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_chunk(bencher: divan::Bencher, size: usize) {
    let enc = encryptor();
    let data = make_data(size);
    let chunk = enc.encrypt_content(&data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| enc.decrypt_content(divan::black_box(&chunk)).unwrap());
}

#[divan::bench(args = [1024, 65536])]
fn bench_content_address(bencher: divan::Bencher, size: usize) {
    let enc = encryptor();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| enc.content_address(divan::black_box(&data)));
}

fn main() {
    divan::main();
}
