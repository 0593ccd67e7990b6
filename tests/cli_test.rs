use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::{PathBuf,Path};
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

// Make a copy in temporary directory with LF newlines, keeping the base name.
// This insulates us against newline substitutions inserted by git or other layers.
fn copy_and_fix_newlines(in_file: PathBuf,temp_dir: &tempfile::TempDir) -> Result<PathBuf,Box<dyn std::error::Error>> {
    let txt = std::fs::read(&in_file).expect("could not read input file");
    let new_txt: Vec<u8> = txt.into_iter().filter(|c| *c!=13).collect();
    let new_txt_path = temp_dir.path().join(in_file.file_name().expect("no file name"));
    match std::fs::write(&new_txt_path,new_txt) {
        Ok(_) => Ok(new_txt_path),
        Err(e) => Err(Box::new(e))
    }
}

fn compress_test(base_name: &str,xext: &str,cext: &str,lz78: bool) -> STDRESULT {
    let mut cmd = Command::cargo_bin("h78")?;
    let temp_dir = tempfile::tempdir()?;
    let src_dir = tempfile::tempdir()?;
    let in_path_any_newline = Path::new("tests").join([base_name,".",xext].concat());
    let in_path = copy_and_fix_newlines(in_path_any_newline,&src_dir)?;
    let cmp_path = Path::new("tests").join([base_name,".",cext].concat());
    let out_path = temp_dir.path().join([base_name,".",cext].concat());
    cmd.arg("compress");
    if lz78 {
        cmd.arg("-l");
    }
    let assert = cmd.arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(predicate::str::contains("Compression ratio").eval(&stderr));
    match (std::fs::read(cmp_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

fn expand_test(base_name: &str,xext: &str,cext: &str,lz78: bool) -> STDRESULT {
    let mut cmd = Command::cargo_bin("h78")?;
    let temp_dir = tempfile::tempdir()?;
    let src_dir = tempfile::tempdir()?;
    let in_path = Path::new("tests").join([base_name,".",cext].concat());
    let cmp_path_any_newline = Path::new("tests").join([base_name,".",xext].concat());
    let cmp_path = copy_and_fix_newlines(cmp_path_any_newline,&src_dir)?;
    let out_path = temp_dir.path().join([base_name,".",xext].concat());
    cmd.arg("expand");
    if lz78 {
        cmd.arg("-l");
    }
    cmd.arg("-i").arg(&in_path)
        .arg("-d").arg(temp_dir.path())
        .assert()
        .success();
    match (std::fs::read(cmp_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

#[test]
fn huffman_compression() -> STDRESULT {
    compress_test("hamlet_excerpt","txt","csz",false)
}

#[test]
fn huffman_expansion() -> STDRESULT {
    expand_test("hamlet_excerpt","txt","csz",false)
}

#[test]
fn lz78_huffman_compression() -> STDRESULT {
    compress_test("hamlet_excerpt","txt","lz.csz",true)
}

#[test]
fn lz78_huffman_expansion() -> STDRESULT {
    expand_test("hamlet_excerpt","txt","lz.csz",true)
}

#[test]
fn empty_file_round_trip() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let out_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("empty.dat");
    let cmp_path = temp_dir.path().join("empty.dat.csz");
    std::fs::write(&in_path,b"")?;
    for lz78 in [false,true] {
        // second pass overwrites, so answer the prompt
        let mut cmd = assert_cmd::Command::cargo_bin("h78")?;
        cmd.arg("compress");
        if lz78 {
            cmd.arg("-l");
        }
        cmd.arg("-i").arg(&in_path).arg("-o").arg(&cmp_path).write_stdin("y\n").assert().success();
        let mut cmd = assert_cmd::Command::cargo_bin("h78")?;
        cmd.arg("expand");
        if lz78 {
            cmd.arg("-l");
        }
        cmd.arg("-i").arg(&cmp_path).arg("-d").arg(out_dir.path()).write_stdin("y\n").assert().success();
        assert_eq!(std::fs::read(out_dir.path().join("empty.dat"))?,Vec::<u8>::new());
    }
    Ok(())
}

#[test]
fn lz78_stage_name() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let src_dir = tempfile::tempdir()?;
    let in_path = copy_and_fix_newlines(Path::new("tests").join("hamlet_excerpt.txt"),&src_dir)?;
    let out_path = temp_dir.path().join("hamlet_excerpt.csz");
    let mut cmd = Command::cargo_bin("h78")?;
    cmd.arg("compress").arg("-l")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    // outer container names the hidden intermediate, inner one names the original
    let (outer,intermediate) = h78::huffman::decode_slice(&std::fs::read(&out_path)?)?;
    assert_eq!(outer,".hamlet_excerpt.txt.lz78");
    let (inner,expanded) = h78::lz78::decode_slice(&intermediate,&h78::lz78::STD_OPTIONS)?;
    assert_eq!(inner,"hamlet_excerpt.txt");
    assert_eq!(expanded,std::fs::read(&in_path)?);
    Ok(())
}

#[test]
fn wrong_format_is_rejected() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let mismatch = predicate::str::contains("FileFormatMismatch");
    let mut cmd = Command::cargo_bin("h78")?;
    let assert = cmd.arg("expand")
        .arg("-i").arg(Path::new("tests").join("hamlet_excerpt.txt"))
        .arg("-d").arg(temp_dir.path())
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(mismatch.eval(&stderr));
    // Huffman container holding plain text, not LZ78
    let mut cmd = Command::cargo_bin("h78")?;
    let assert = cmd.arg("expand")
        .arg("-l")
        .arg("-i").arg(Path::new("tests").join("hamlet_excerpt.csz"))
        .arg("-d").arg(temp_dir.path())
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(mismatch.eval(&stderr));
    Ok(())
}

#[test]
fn missing_input() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let mut cmd = Command::cargo_bin("h78")?;
    cmd.arg("compress")
        .arg("-i").arg(temp_dir.path().join("not_here.txt"))
        .arg("-o").arg(temp_dir.path().join("not_here.txt.csz"))
        .assert()
        .failure();
    Ok(())
}

#[test]
fn usage_errors() -> STDRESULT {
    let mut cmd = Command::cargo_bin("h78")?;
    cmd.assert().failure();
    let mut cmd = Command::cargo_bin("h78")?;
    cmd.arg("compress").assert().failure();
    Ok(())
}
